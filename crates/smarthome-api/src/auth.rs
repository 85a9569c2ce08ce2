//! Shared API key check.
//!
//! Every protected route requires the configured key in `X-API-Key` or
//! `Authorization: Bearer <key>`.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::models::ErrorResponse;
use crate::server::ServerState;

/// Holds the digest of the single accepted API key.
#[derive(Clone)]
pub struct ApiKeyAuth {
    digest: [u8; 32],
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").finish_non_exhaustive()
    }
}

impl ApiKeyAuth {
    pub fn new(api_key: &str) -> Self {
        Self {
            digest: hash_key(api_key),
        }
    }

    /// Compare digests so the check does not depend on where the keys differ.
    pub fn validate_key(&self, candidate: &str) -> bool {
        let candidate = hash_key(candidate);
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn hash_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Extract the presented key from `X-API-Key` or a bearer token.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
}

/// API key authentication middleware.
pub async fn api_key_middleware(
    State(state): State<ServerState>,
    headers: HeaderMap,
    req: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let api_key = presented_key(&headers).ok_or_else(|| {
        ErrorResponse::unauthorized(
            "Missing API key. Provide X-API-Key header or Authorization: Bearer <key>",
        )
    })?;

    if !state.auth.validate_key(api_key) {
        tracing::debug!(category = "auth", path = %req.uri().path(), "invalid_api_key");
        return Err(ErrorResponse::unauthorized("Invalid API key"));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn validates_only_the_configured_key() {
        let auth = ApiKeyAuth::new("devkey");
        assert!(auth.validate_key("devkey"));
        assert!(!auth.validate_key("devkey "));
        assert!(!auth.validate_key(""));
    }

    #[test]
    fn reads_header_or_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_key(&headers), Some("abc"));

        headers.insert("x-api-key", HeaderValue::from_static("xyz"));
        assert_eq!(presented_key(&headers), Some("xyz"));
    }
}
