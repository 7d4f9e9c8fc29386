use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::warn;

use common::{Error, Result};

use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Checks presented bearer tokens against the configured one.
///
/// Both sides are MACed under a per-process random key and the tags are
/// compared with `verify_slice`, so the comparison time does not depend on
/// where the first differing byte is, nor on the token length.
pub struct TokenVerifier {
    key: [u8; 32],
    expected: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(Error::Config("API token must not be empty".into()));
        }
        let key: [u8; 32] = rand::random();
        let expected = Self::tag(&key, token).finalize().into_bytes().to_vec();
        Ok(Self { key, expected })
    }

    pub fn verify(&self, presented: &str) -> bool {
        Self::tag(&self.key, presented)
            .verify_slice(&self.expected)
            .is_ok()
    }

    fn tag(key: &[u8], data: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(data.as_bytes());
        mac
    }
}

/// Middleware that enforces bearer token authentication on all protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) if state.verifier.verify(t) => next.run(request).await,
        _ => {
            warn!(path = %request.uri().path(), "Rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response()
        }
    }
}
