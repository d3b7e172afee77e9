use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::{CredentialError, StorageError, TokenError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired - token refresh failed: {detail}")]
    RefreshFailed {
        status: Option<StatusCode>,
        detail: String,
    },

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {body}")]
    ServerError { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Malformed token: {0}")]
    MalformedToken(#[from] TokenError),

    #[error("Credential storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Upload of {file} failed: {message}")]
    Upload { file: String, message: String },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => match FieldErrors::from_body(body) {
                Some(fields) => ApiError::Validation(fields),
                None => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
            },
            401 => ApiError::Unauthorized(truncated),
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError {
                status,
                body: truncated,
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// HTTP status behind this error, when it came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::RefreshFailed { status, .. } => *status,
            ApiError::Validation(_) => Some(StatusCode::BAD_REQUEST),
            ApiError::AccessDenied(_) => Some(StatusCode::FORBIDDEN),
            ApiError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            ApiError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS),
            ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message to show the user.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized(body)
            | ApiError::AccessDenied(body)
            | ApiError::NotFound(body)
            | ApiError::ServerError { body, .. } => {
                extract_detail(body).unwrap_or_else(|| self.to_string())
            }
            ApiError::RefreshFailed { detail, .. } => {
                extract_detail(detail).unwrap_or_else(|| detail.clone())
            }
            ApiError::Validation(fields) => fields
                .first()
                .map(|(field, message)| format!("{}: {}", field, message))
                .unwrap_or_else(|| self.to_string()),
            _ => self.to_string(),
        }
    }

    /// True when the user has to sign in (again) before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_) | ApiError::RefreshFailed { .. }
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Network(error.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::MalformedToken(e) => ApiError::MalformedToken(e),
            CredentialError::Storage(e) => ApiError::Storage(e),
        }
    }
}

/// Pull the message out of an error body: a bare JSON string, a `detail`
/// field, or the first field error.
fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => Some(s),
        Ok(Value::Object(map)) => {
            if let Some(Value::String(detail)) = map.get("detail") {
                return Some(detail.clone());
            }
            FieldErrors::from_map(&map)
                .and_then(|f| f.first().map(|(field, message)| format!("{}: {}", field, message)))
        }
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Field-level validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Parse a `{"field": ["message", ...]}` body. Plain string values count as
    /// a single message. Returns `None` when the body has no field errors.
    pub fn from_body(body: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            _ => None,
        }
    }

    fn from_map(map: &serde_json::Map<String, Value>) -> Option<Self> {
        let mut fields = BTreeMap::new();
        for (field, value) in map {
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            if !messages.is_empty() {
                fields.insert(field.clone(), messages);
            }
        }
        if fields.is_empty() {
            None
        } else {
            Some(Self(fields))
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn first(&self) -> Option<(&str, &str)> {
        self.0
            .iter()
            .find_map(|(field, messages)| messages.first().map(|m| (field.as_str(), m.as_str())))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "no"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream");
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "plain text"),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_validation_errors() {
        let body = r#"{"password": ["Passwords must match."], "email": "A user with this email already exists."}"#;
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, body);
        let ApiError::Validation(fields) = &err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(fields.get("password"), Some(&["Passwords must match.".to_string()][..]));
        assert_eq!(
            fields.get("email").map(|m| m.len()),
            Some(1)
        );
        // BTreeMap ordering: email sorts before password
        assert_eq!(err.detail(), "email: A user with this email already exists.");
        assert!(!err.requires_login());
    }

    #[test]
    fn test_detail_extraction() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"detail": "No active account found with the given credentials"}"#,
        );
        assert_eq!(err.detail(), "No active account found with the given credentials");
        assert!(err.requires_login());

        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#""gone""#);
        assert_eq!(err.detail(), "gone");

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.detail(), "<html>oops</html>");

        let err = ApiError::from_status(StatusCode::FORBIDDEN, "");
        assert_eq!(err.detail(), "Access denied: ");
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
