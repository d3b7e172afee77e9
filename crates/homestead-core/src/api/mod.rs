//! REST API client module for the listings backend.
//!
//! This module provides:
//! - `Gateway`: attaches the bearer token to every call and performs the
//!   single refresh-and-retry on a 401
//! - `ApiClient`: typed account, listing and upload-signature endpoints
//! - `Transport`: the HTTP seam, backed by reqwest in production

pub mod client;
pub mod error;
pub mod gateway;
pub mod transport;

pub use client::{ApiClient, DEFAULT_TIMEOUT_SECS};
pub use error::{ApiError, FieldErrors};
pub use gateway::{Gateway, GatewayConfig, RequestAttempt, RequestDescriptor};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
