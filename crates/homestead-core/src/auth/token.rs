//! Access token decoding.
//!
//! The identity of the signed-in user is a pure projection of the access
//! token's payload segment. Nothing here verifies the signature; the server
//! does that on every request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is empty")]
    Empty,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// User attributes carried in a valid access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Name to greet the user with: username when the token carries one.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}

/// Decode the identity claims from an access token.
pub fn decode_identity(token: &str) -> Result<Identity, TokenError> {
    if token.trim().is_empty() {
        return Err(TokenError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {}", e)))?;

    let claims: Value = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::Malformed(format!("payload is not JSON: {}", e)))?;
    let claims = claims
        .as_object()
        .ok_or_else(|| TokenError::Malformed("payload is not a JSON object".to_string()))?;

    let id = match claims.get("user_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| TokenError::Malformed("missing or invalid user_id claim".to_string()))?;

    let email = match claims.get("email") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(TokenError::Malformed("missing or invalid email claim".to_string())),
    };

    let username = match claims.get("username") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::String(_)) | Some(Value::Null) | None => None,
        Some(_) => return Err(TokenError::Malformed("invalid username claim".to_string())),
    };

    let expires_at = match claims.get("exp") {
        Some(Value::Number(n)) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| TokenError::Malformed("invalid exp claim".to_string()))?;
            Some(
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?,
            )
        }
        None | Some(Value::Null) => None,
        Some(_) => return Err(TokenError::Malformed("invalid exp claim".to_string())),
    };

    Ok(Identity {
        id,
        email,
        username,
        expires_at,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Build a token with the given claims between a fixed header and signature.
    pub(crate) fn make_token(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.c2lnbmF0dXJl", header, payload)
    }

    pub(crate) fn token_for(id: i64, email: &str) -> String {
        make_token(json!({ "user_id": id, "email": email, "username": "agent" }))
    }

    #[test]
    fn test_decode_identity() {
        let token = make_token(json!({
            "user_id": 42,
            "email": "a@b.com",
            "username": "alice",
            "exp": 1_700_000_000,
            "token_type": "access"
        }));

        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.id, 42);
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.username.as_deref(), Some("alice"));
        assert_eq!(identity.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(identity.display_name(), "alice");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let token = token_for(7, "x@y.org");
        assert_eq!(decode_identity(&token), decode_identity(&token));
    }

    #[test]
    fn test_decode_accepts_string_id_and_padding() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = base64::engine::general_purpose::URL_SAFE
            .encode(json!({ "user_id": "15", "email": "p@q.io" }).to_string());
        let token = format!("{}.{}.sig", header, payload);

        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.id, 15);
        assert_eq!(identity.username, None);
        assert_eq!(identity.display_name(), "p@q.io");
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert_eq!(decode_identity(""), Err(TokenError::Empty));
        assert!(matches!(decode_identity("not-a-token"), Err(TokenError::Malformed(_))));
        assert!(matches!(decode_identity("a..c"), Err(TokenError::Malformed(_))));
        assert!(matches!(decode_identity("a.!!!.c"), Err(TokenError::Malformed(_))));

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode_identity(&not_json), Err(TokenError::Malformed(_))));

        let array = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(decode_identity(&array), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_missing_claims() {
        let no_email = make_token(json!({ "user_id": 1 }));
        assert!(matches!(decode_identity(&no_email), Err(TokenError::Malformed(_))));

        let no_id = make_token(json!({ "email": "a@b.com" }));
        assert!(matches!(decode_identity(&no_id), Err(TokenError::Malformed(_))));

        let bad_id = make_token(json!({ "user_id": "abc", "email": "a@b.com" }));
        assert!(matches!(decode_identity(&bad_id), Err(TokenError::Malformed(_))));

        let bad_exp = make_token(json!({ "user_id": 1, "email": "a@b.com", "exp": "soon" }));
        assert!(matches!(decode_identity(&bad_exp), Err(TokenError::Malformed(_))));
    }
}
