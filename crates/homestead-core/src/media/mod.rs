//! Direct-to-host media uploads.
//!
//! The backend only signs uploads; file bytes go straight from this process
//! to the media host, which answers with the URL to attach to a listing.

pub mod upload;

pub use upload::{MediaUploader, DEFAULT_MEDIA_BASE_URL};
