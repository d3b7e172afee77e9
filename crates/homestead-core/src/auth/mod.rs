//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `decode_identity`: typed decoding of the access token payload
//! - `TokenStorage`: durable storage backends (file, OS keychain, memory)
//! - `CredentialStore`: the token pair, its derived identity, and observers
//! - `Session`: login, logout and registration on top of the store
//!
//! Sessions survive restarts through the configured storage backend.

pub mod credentials;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::{
    FileStorage, KeyringStorage, MemoryStorage, StorageError, TokenStorage, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
pub use session::Session;
pub use store::{AuthEvent, CredentialError, CredentialStore, SessionSnapshot};
pub use token::{decode_identity, Identity, TokenError};
