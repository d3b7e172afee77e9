//! Homestead core - credential store, authenticated API gateway, listings
//! client and direct media uploads for the homestead property listings app.
//!
//! Typical wiring:
//!
//! ```rust,ignore
//! let config = Config::load()?;
//! let store = Arc::new(CredentialStore::new(config.token_storage()?));
//! store.initialize();
//! let api = ApiClient::new(config.gateway_config()?, store, config.timeout())?;
//! let session = Session::new(api.clone());
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod media;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, FieldErrors, Gateway, GatewayConfig};
pub use auth::{AuthEvent, CredentialStore, Identity, Session, SessionSnapshot};
pub use config::Config;
pub use media::MediaUploader;
