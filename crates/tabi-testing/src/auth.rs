//! Mock session helpers for HTTP tests.
//!
//! Protected routes read a signed session token from the `Authorization` header or the
//! `session_token` cookie. `MockSession` signs one with the test keys so a test can call
//! those routes without walking through the login-code flow first.

use axum::http::{HeaderName, HeaderValue, header};
use uuid::Uuid;

use tabi_auth_types::cookie::SESSION_COOKIE;
use tabi_auth_types::token::{SessionKeys, issue_session, issue_session_at, now_secs};

/// A signed session for a chosen identity.
pub struct MockSession {
    pub identity_id: Uuid,
    pub token: String,
}

impl MockSession {
    /// Sign a session that is valid for the keys' TTL from now.
    pub fn new(identity_id: Uuid, keys: &SessionKeys) -> Self {
        let issued = issue_session(identity_id, keys).unwrap();
        Self {
            identity_id,
            token: issued.token,
        }
    }

    /// Sign a session whose expiry already passed.
    pub fn expired(identity_id: Uuid, keys: &SessionKeys) -> Self {
        let issued_at = now_secs() - keys.ttl_secs() - 60;
        let issued = issue_session_at(identity_id, keys, issued_at).unwrap();
        Self {
            identity_id,
            token: issued.token,
        }
    }

    /// `Authorization: Bearer <token>` header pair.
    pub fn bearer_header(&self) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token)).unwrap(),
        )
    }

    /// `Cookie: session_token=<token>` header pair.
    pub fn cookie_header(&self) -> (HeaderName, HeaderValue) {
        (
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={}", self.token)).unwrap(),
        )
    }
}
