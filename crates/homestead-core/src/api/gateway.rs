//! Authenticated request dispatch.
//!
//! Every API call goes through [`Gateway::send`], which attaches the current
//! access token and, on a 401, exchanges the refresh token for a new access
//! token and retries the original request once. The gateway is the only
//! component that changes tokens as a side effect of network activity.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::ApiError;
use crate::auth::CredentialStore;

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/api/v1/User_details/login/refresh/";

/// Method, path, query and body of an API call, independent of credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// One original request on its way through the gateway.
///
/// `retried` is set only on the copy produced by [`retry`](Self::retry), and
/// a retried attempt cannot be retried again.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttempt {
    descriptor: RequestDescriptor,
    retried: bool,
}

impl RequestAttempt {
    pub fn new(descriptor: RequestDescriptor) -> Self {
        Self {
            descriptor,
            retried: false,
        }
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// The follow-up attempt after a refresh, or `None` if this attempt was
    /// already the retry.
    pub fn retry(&self) -> Option<RequestAttempt> {
        if self.retried {
            None
        } else {
            Some(Self {
                descriptor: self.descriptor.clone(),
                retried: true,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: Url,
    /// Serialize refreshes so a burst of 401s costs a single refresh call
    pub dedupe_refresh: bool,
}

impl GatewayConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            dedupe_refresh: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// A refresh that ended the session, kept so that callers queued behind it
/// report the same failure.
#[derive(Debug)]
struct FailedRefresh {
    /// Store generation right after the session was ended
    generation: u64,
    status: Option<StatusCode>,
    detail: String,
}

pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    config: GatewayConfig,
    refresh_lock: Mutex<Option<FailedRefresh>>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            store,
            config,
            refresh_lock: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Send a request with the stored access token.
    ///
    /// Non-2xx responses other than 401 are returned as errors without any
    /// retry or credential change. A 401 triggers at most one refresh and one
    /// retry; the retry's outcome is final.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<HttpResponse, ApiError> {
        let attempt = RequestAttempt::new(descriptor);
        let (token, generation) = self.store.access_token_with_generation();

        let response = self.dispatch(&attempt, token.as_deref()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Self::check(response);
        }

        let Some(retry) = attempt.retry() else {
            return Self::check(response);
        };
        if !self.store.has_refresh_token() {
            debug!(path = %attempt.descriptor().path, "401 without refresh token");
            return Self::check(response);
        }

        let fresh_token = self.refreshed_token(generation).await?;
        let response = self.dispatch(&retry, Some(&fresh_token)).await?;
        Self::check(response)
    }

    /// Send a request without credentials, bypassing refresh handling.
    pub async fn send_anonymous(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<HttpResponse, ApiError> {
        let response = self.dispatch(&RequestAttempt::new(descriptor), None).await?;
        Self::check(response)
    }

    /// Obtain an access token newer than the one seen at `seen_generation`.
    async fn refreshed_token(&self, seen_generation: u64) -> Result<String, ApiError> {
        if !self.config.dedupe_refresh {
            return self.refresh().await;
        }

        let mut last_failure = self.refresh_lock.lock().await;
        let (current, generation) = self.store.access_token_with_generation();
        if generation != seen_generation {
            // Another request refreshed (or ended) the session while we waited
            return match (current, (*last_failure).as_ref()) {
                (Some(token), _) => {
                    debug!("Reusing access token refreshed by a concurrent request");
                    Ok(token)
                }
                (None, Some(failure)) if failure.generation == generation => {
                    Err(ApiError::RefreshFailed {
                        status: failure.status,
                        detail: failure.detail.clone(),
                    })
                }
                (None, _) => Err(ApiError::Unauthorized(
                    "Session ended while waiting for token refresh".to_string(),
                )),
            };
        }

        let result = self.refresh().await;
        *last_failure = match &result {
            Err(ApiError::RefreshFailed { status, detail }) => Some(FailedRefresh {
                generation: self.store.access_token_with_generation().1,
                status: *status,
                detail: detail.clone(),
            }),
            _ => None,
        };
        result
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Any failure ends the session and is reported as `RefreshFailed`.
    async fn refresh(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Err(ApiError::Unauthorized("No refresh token available".to_string()));
        };

        match self.exchange(&refresh_token).await {
            Ok(access) => {
                info!("Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.store.expire();
                if matches!(e, ApiError::RefreshFailed { .. }) {
                    Err(e)
                } else {
                    Err(ApiError::RefreshFailed {
                        status: e.status(),
                        detail: e.to_string(),
                    })
                }
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<String, ApiError> {
        let descriptor = RequestDescriptor::post(REFRESH_PATH).json(&RefreshRequest {
            refresh: refresh_token,
        })?;
        let response = self
            .dispatch(&RequestAttempt::new(descriptor), None)
            .await?;
        if !response.is_success() {
            return Err(ApiError::RefreshFailed {
                status: Some(response.status),
                detail: response.body,
            });
        }

        let RefreshResponse { access } = response.json()?;
        self.store.set_access_token(&access)?;
        Ok(access)
    }

    async fn dispatch(
        &self,
        attempt: &RequestAttempt,
        token: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let descriptor = attempt.descriptor();
        let request = HttpRequest {
            method: descriptor.method.clone(),
            url: self.resolve(descriptor)?,
            headers: Self::auth_headers(token)?,
            body: descriptor.body.clone(),
        };

        debug!(
            method = %request.method,
            url = %request.url,
            authenticated = token.is_some(),
            retried = attempt.is_retried(),
            "Dispatching request"
        );
        self.transport.send(request).await
    }

    /// Resolve a request path under the base URL, keeping any path prefix
    /// the base carries (`https://host/backend/` + `/api/v1/...`).
    fn resolve(&self, descriptor: &RequestDescriptor) -> Result<Url, ApiError> {
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let prefix = format!("{}/", base.path());
            base.set_path(&prefix);
        }
        let relative = descriptor.path.trim_start_matches('/');
        let mut url = base.join(relative).map_err(|e| {
            ApiError::InvalidResponse(format!("Invalid request path {}: {}", descriptor.path, e))
        })?;
        if !descriptor.query.is_empty() {
            url.query_pairs_mut().extend_pairs(descriptor.query.iter());
        }
        Ok(url)
    }

    fn auth_headers(token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::MalformedToken(crate::auth::TokenError::Malformed(
                    "token is not a valid header value".to_string(),
                ))
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn check(response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }
}
