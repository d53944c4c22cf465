//! Session identity extractor.

use axum::extract::{FromRef, FromRequestParts};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use http::request::Parts;
use http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use uuid::Uuid;

use crate::cookie::SESSION_COOKIE;
use crate::token::{SessionKeys, verify_session};

/// Identity carried by a verified session token.
///
/// The token is read from `Authorization: Bearer <token>` first, then from the
/// `session_token` cookie. Any missing, malformed, forged or expired token is rejected
/// with 401.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub identity_id: Uuid,
    pub expires_at: u64,
}

/// Rejection for [`SessionIdentity`].
#[derive(Debug, thiserror::Error)]
pub enum SessionRejection {
    #[error("no session token")]
    Missing,
    #[error("invalid session token")]
    Invalid,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        // Both cases look the same to the client.
        let body = serde_json::json!({
            "kind": "UNAUTHENTICATED",
            "message": "Not authenticated",
        });
        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for SessionIdentity
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    // Resolve synchronously and hand back a 'static future, like the other extractors here.
    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let keys = SessionKeys::from_ref(state);
        let token = bearer_token(&parts.headers).or_else(|| cookie_token(&parts.headers));
        let result = match token {
            None => Err(SessionRejection::Missing),
            Some(token) => verify_session(&token, &keys)
                .and_then(|claims| {
                    claims.identity_id().map(|identity_id| Self {
                        identity_id,
                        expires_at: claims.exp,
                    })
                })
                .ok_or(SessionRejection::Invalid),
        };

        async move { result }
    }
}
