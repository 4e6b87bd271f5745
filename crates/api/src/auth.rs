//! Basic-auth extraction through the Authenticator port.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::routes::AppState;

/// Opaque credential checker, owned by an external collaborator.
///
/// Returns the claimant identity on success, `None` on rejection.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Option<String>;
}

/// The authenticated claimant identity, extracted from HTTP Basic
/// credentials on every `/api` request.
#[derive(Debug, Clone)]
pub struct Claimant(pub String);

/// 401 with a Basic challenge, so browsers and curl prompt correctly.
fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"paydesk\"")],
        "authentication required",
    )
        .into_response()
}

#[async_trait]
impl FromRequestParts<AppState> for Claimant {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(decode_basic)
            .ok_or_else(unauthorized)?;

        let (username, password) = credentials;
        match state.authenticator.authenticate(&username, &password).await {
            Some(identity) => Ok(Claimant(identity)),
            None => Err(unauthorized()),
        }
    }
}

/// Decode an `Authorization: Basic <base64(user:pass)>` header value.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_basic_credentials() {
        let header = format!("Basic {}", BASE64.encode("Banfield:hunter2"));
        assert_eq!(
            decode_basic(&header),
            Some(("Banfield".into(), "hunter2".into()))
        );
    }

    #[test]
    fn password_may_contain_colons() {
        let header = format!("Basic {}", BASE64.encode("user:pa:ss"));
        assert_eq!(decode_basic(&header), Some(("user".into(), "pa:ss".into())));
    }

    #[test]
    fn rejects_non_basic_schemes_and_garbage() {
        assert!(decode_basic("Bearer token").is_none());
        assert!(decode_basic("Basic not-base64!!").is_none());
    }
}
