//! Data models for the listings API.
//!
//! - `Listing`, `ListingDraft`, `ListingFilter`: property listings and search
//! - `LoginRequest`, `TokenPair`, `RegisterRequest`: account endpoints
//! - `UploadSignature`, `UploadResult`: direct media uploads

pub mod account;
pub mod listing;
pub mod media;

pub use account::{LoginRequest, RegisterRequest, TokenPair};
pub use listing::{Listing, ListingDraft, ListingFilter, ListingImage, ListingStatus};
pub use media::{UploadResult, UploadSignature};
