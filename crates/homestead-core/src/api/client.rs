//! API client for the listings backend.
//!
//! This module provides the `ApiClient` struct: typed wrappers around the
//! account, listing and upload-signature endpoints, all sent through the
//! [`Gateway`] so they share token attachment and refresh handling.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::gateway::{Gateway, GatewayConfig, RequestDescriptor};
use super::transport::{ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::{CredentialStore, Identity};
use crate::models::{
    Listing, ListingDraft, ListingFilter, LoginRequest, RegisterRequest, TokenPair,
    UploadSignature,
};

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint (email + password for a token pair)
const LOGIN_PATH: &str = "/api/v1/User_details/login/";

/// Registration endpoint
const REGISTER_PATH: &str = "/api/v1/User_details/register/";

/// Listings collection endpoint
const LISTINGS_PATH: &str = "/api/v1/properties/";

/// Signature endpoint for direct media uploads
const UPLOAD_SIGNATURE_PATH: &str = "/api/v1/generate-upload-signature/";

/// Message shown when a failed login carries no detail from the server
const LOGIN_FAILED_MESSAGE: &str = "Login failed.";

/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// API client for the listings backend.
/// Clone is cheap - the gateway is shared.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Arc<Gateway>,
}

impl ApiClient {
    /// Create a client over reqwest for `config.base_url`.
    pub fn new(
        config: GatewayConfig,
        store: Arc<CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::with_transport(Arc::new(transport), store, config))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            gateway: Arc::new(Gateway::new(transport, store, config)),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.gateway.store()
    }

    pub fn base_url(&self) -> &Url {
        self.gateway.base_url()
    }

    // ===== Account =====

    /// Exchange email and password for a token pair and install it.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let descriptor =
            RequestDescriptor::post(LOGIN_PATH).json(&LoginRequest { email, password })?;

        let tokens: TokenPair = match self.gateway.send_anonymous(descriptor).await {
            Ok(response) => response.json()?,
            Err(e) => {
                debug!(error = %e, "Login rejected");
                return Err(match e {
                    ApiError::Unauthorized(body) if body.trim().is_empty() => {
                        ApiError::Unauthorized(LOGIN_FAILED_MESSAGE.to_string())
                    }
                    other => other,
                });
            }
        };

        Ok(self.store().set_credential(&tokens.access, &tokens.refresh)?)
    }

    /// Create an account. Field problems come back as `ApiError::Validation`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), ApiError> {
        let descriptor = RequestDescriptor::post(REGISTER_PATH).json(&RegisterRequest {
            username,
            email,
            password,
            password_confirmation,
        })?;
        self.gateway.send_anonymous(descriptor).await?;
        Ok(())
    }

    // ===== Listings =====

    pub async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>, ApiError> {
        let listings: Vec<Listing> = self
            .fetch(RequestDescriptor::get(LISTINGS_PATH).query(filter.to_query()))
            .await?;
        debug!(count = listings.len(), "Fetched listings");
        Ok(listings)
    }

    pub async fn get_listing(&self, id: i64) -> Result<Listing, ApiError> {
        self.fetch(RequestDescriptor::get(Self::listing_path(id))).await
    }

    pub async fn create_listing(&self, draft: &ListingDraft) -> Result<Listing, ApiError> {
        self.fetch(RequestDescriptor::post(LISTINGS_PATH).json(draft)?)
            .await
    }

    /// Replace a listing (PUT). Images change only if `draft.image_urls` is set.
    pub async fn update_listing(&self, id: i64, draft: &ListingDraft) -> Result<Listing, ApiError> {
        self.fetch(RequestDescriptor::put(Self::listing_path(id)).json(draft)?)
            .await
    }

    pub async fn delete_listing(&self, id: i64) -> Result<(), ApiError> {
        self.gateway
            .send(RequestDescriptor::delete(Self::listing_path(id)))
            .await?;
        Ok(())
    }

    // ===== Media =====

    /// Ask the backend to sign one direct upload into `folder`.
    pub async fn upload_signature(&self, folder: Option<&str>) -> Result<UploadSignature, ApiError> {
        let body = match folder {
            Some(folder) => json!({ "folder": folder }),
            None => json!({}),
        };
        self.fetch(RequestDescriptor::post(UPLOAD_SIGNATURE_PATH).json(&body)?)
            .await
    }

    fn listing_path(id: i64) -> String {
        format!("{}{}/", LISTINGS_PATH, id)
    }

    async fn fetch<T: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> Result<T, ApiError> {
        let path = descriptor.path.clone();
        let response = self.gateway.send(descriptor).await?;
        response.json().map_err(|e| {
            ApiError::InvalidResponse(format!("Unexpected response from {}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::api::transport::fake::FakeTransport;
    use crate::api::transport::HttpResponse;
    use crate::auth::token::tests::token_for;
    use crate::auth::MemoryStorage;
    use crate::models::ListingStatus;

    fn client(transport: &FakeTransport) -> ApiClient {
        let store = Arc::new(CredentialStore::new(Arc::new(MemoryStorage::new())));
        store.initialize();
        ApiClient::with_transport(
            Arc::new(transport.clone()),
            store,
            GatewayConfig::new(Url::parse("http://api.test").unwrap()),
        )
    }

    fn listing_json(id: i64) -> serde_json::Value {
        json!({
            "id": id, "owner": 1, "owner_username": "agent", "address": "1 Main St",
            "city": "Springfield", "state": "IL", "zip_code": "62701",
            "price": "250000.00", "bedrooms": 2, "bathrooms": "1.0", "size": 900,
            "description": "Cozy", "status": "active", "images": []
        })
    }

    #[tokio::test]
    async fn test_login_installs_credentials() {
        let access = token_for(1, "a@b.com");
        let issued = access.clone();
        let transport = FakeTransport::new(move |req| {
            assert_eq!(req.url.path(), LOGIN_PATH);
            assert_eq!(req.body, Some(json!({ "email": "a@b.com", "password": "x" })));
            HttpResponse::json_body(StatusCode::OK, &json!({ "access": issued, "refresh": "R1" }))
        });
        let client = client(&transport);

        let identity = client.login("a@b.com", "x").await.unwrap();
        assert_eq!(identity.id, 1);
        assert!(client.store().current().is_authenticated());
        assert_eq!(client.store().access_token(), Some(access));
        assert_eq!(client.store().refresh_token().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_server_detail() {
        let transport = FakeTransport::new(|_| {
            HttpResponse::json_body(
                StatusCode::UNAUTHORIZED,
                &json!({ "detail": "No active account found with the given credentials" }),
            )
        });
        let client = client(&transport);

        let err = client.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(err.detail(), "No active account found with the given credentials");
        assert!(!client.store().is_authenticated());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_without_detail() {
        let transport = FakeTransport::new(|_| HttpResponse::new(StatusCode::UNAUTHORIZED, ""));
        let err = client(&transport).login("a@b.com", "x").await.unwrap_err();
        assert_eq!(err.detail(), LOGIN_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_login_with_malformed_token_retains_nothing() {
        let transport = FakeTransport::new(|_| {
            HttpResponse::json_body(StatusCode::OK, &json!({ "access": "bogus", "refresh": "R1" }))
        });
        let client = client(&transport);

        let err = client.login("a@b.com", "x").await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedToken(_)));
        assert!(!client.store().is_authenticated());
        assert!(!client.store().has_refresh_token());
    }

    #[tokio::test]
    async fn test_register_field_errors() {
        let transport = FakeTransport::new(|req| {
            assert_eq!(req.url.path(), REGISTER_PATH);
            assert_eq!(req.body.as_ref().unwrap()["password2"], "b");
            HttpResponse::json_body(
                StatusCode::BAD_REQUEST,
                &json!({ "password": ["Passwords must match."] }),
            )
        });
        let client = client(&transport);

        let err = client.register("alice", "a@b.com", "a", "b").await.unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.first(), Some(("password", "Passwords must match.")));
    }

    #[tokio::test]
    async fn test_register_success() {
        let transport = FakeTransport::new(|_| HttpResponse::new(StatusCode::CREATED, "{}"));
        client(&transport)
            .register("alice", "a@b.com", "pw", "pw")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_listings_sends_filters() {
        let transport = FakeTransport::new(|_| {
            HttpResponse::json_body(StatusCode::OK, &json!([listing_json(1), listing_json(2)]))
        });
        let client = client(&transport);
        let filter = ListingFilter {
            location: Some("Springfield".to_string()),
            min_price: Some(100000.0),
            ..Default::default()
        };

        let listings = client.list_listings(&filter).await.unwrap();
        assert_eq!(listings.len(), 2);

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url.query(),
            Some("location=Springfield&min_price=100000")
        );
    }

    #[tokio::test]
    async fn test_listing_crud_paths() {
        let transport = FakeTransport::new(|req| match req.method {
            Method::DELETE => HttpResponse::new(StatusCode::NO_CONTENT, ""),
            Method::POST => HttpResponse::json_body(StatusCode::CREATED, &listing_json(7)),
            _ => HttpResponse::json_body(StatusCode::OK, &listing_json(7)),
        });
        let client = client(&transport);
        let draft = ListingDraft {
            address: "1 Main St".to_string(),
            price: 250000.0,
            status: ListingStatus::Active,
            ..Default::default()
        };

        assert_eq!(client.get_listing(7).await.unwrap().id, 7);
        assert_eq!(client.create_listing(&draft).await.unwrap().id, 7);
        assert_eq!(client.update_listing(7, &draft).await.unwrap().id, 7);
        client.delete_listing(7).await.unwrap();

        let requests = transport.requests();
        let seen: Vec<(Method, &str)> = requests
            .iter()
            .map(|r| (r.method.clone(), r.url.path()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Method::GET, "/api/v1/properties/7/"),
                (Method::POST, "/api/v1/properties/"),
                (Method::PUT, "/api/v1/properties/7/"),
                (Method::DELETE, "/api/v1/properties/7/"),
            ]
        );
        assert_eq!(requests[1].body.as_ref().unwrap()["price"], 250000.0);
    }

    #[tokio::test]
    async fn test_create_listing_validation_error() {
        let transport = FakeTransport::new(|_| {
            HttpResponse::json_body(
                StatusCode::BAD_REQUEST,
                &json!({ "zip_code": ["This field may not be blank."] }),
            )
        });
        let err = client(&transport)
            .create_listing(&ListingDraft::default())
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "zip_code: This field may not be blank.");
    }

    #[tokio::test]
    async fn test_upload_signature() {
        let transport = FakeTransport::new(|req| {
            assert_eq!(req.body, Some(json!({ "folder": "properties" })));
            HttpResponse::json_body(
                StatusCode::OK,
                &json!({
                    "signature": "abc123", "timestamp": 1700000000,
                    "api_key": "key", "cloud_name": "demo", "folder": "properties"
                }),
            )
        });
        let signature = client(&transport)
            .upload_signature(Some("properties"))
            .await
            .unwrap();
        assert_eq!(signature.cloud_name, "demo");
        assert_eq!(signature.timestamp, 1700000000);
    }
}
