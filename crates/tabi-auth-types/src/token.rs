//! Session JWT issuing and verification.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default session lifetime in seconds (15 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 900;

/// Errors returned while signing or decoding a session token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("failed to sign session token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Server-side signing material plus the session lifetime.
///
/// Only HMAC algorithms are accepted: the key is a shared secret string.
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    algorithm: Algorithm,
    ttl_secs: u64,
}

impl SessionKeys {
    pub fn new(
        secret: impl Into<String>,
        algorithm: &str,
        ttl_secs: u64,
    ) -> Result<Self, TokenError> {
        let parsed = algorithm
            .parse::<Algorithm>()
            .map_err(|_| TokenError::UnsupportedAlgorithm(algorithm.to_owned()))?;
        if !matches!(
            parsed,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::UnsupportedAlgorithm(algorithm.to_owned()));
        }
        Ok(Self {
            secret: secret.into(),
            algorithm: parsed,
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"[redacted]")
            .field("algorithm", &self.algorithm)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// JWT claims carried by a session token.
///
/// | Field | Meaning |
/// |-------|---------|
/// | `sub` | identity id (UUID string) |
/// | `iat` | issue time, seconds since epoch |
/// | `exp` | absolute expiry, seconds since epoch |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

impl SessionClaims {
    /// The identity id named by `sub`, or `None` if it is not a UUID.
    pub fn identity_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}

/// A freshly signed session token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: u64,
}

/// Current time in seconds since the UNIX epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Sign a session for `identity_id`, valid for the configured TTL from now.
pub fn issue_session(identity_id: Uuid, keys: &SessionKeys) -> Result<IssuedSession, TokenError> {
    issue_session_at(identity_id, keys, now_secs())
}

/// Sign a session as if issued at `issued_at` (seconds since epoch).
pub fn issue_session_at(
    identity_id: Uuid,
    keys: &SessionKeys,
    issued_at: u64,
) -> Result<IssuedSession, TokenError> {
    let claims = SessionClaims {
        sub: identity_id.to_string(),
        iat: issued_at,
        exp: issued_at.saturating_add(keys.ttl_secs),
    };
    let token = encode(
        &Header::new(keys.algorithm),
        &claims,
        &EncodingKey::from_secret(keys.secret.as_bytes()),
    )
    .map_err(TokenError::Signing)?;
    Ok(IssuedSession {
        token,
        expires_at: claims.exp,
    })
}

/// Decode and validate a session token.
///
/// Validation: configured algorithm only, `exp` checked with zero leeway, `exp` and `sub`
/// required.
pub fn decode_session(token: &str, keys: &SessionKeys) -> Result<SessionClaims, TokenError> {
    let mut validation = Validation::new(keys.algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(keys.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    Ok(data.claims)
}

/// Verify a session token. Every failure is an ordinary "unauthenticated" outcome.
pub fn verify_session(token: &str, keys: &SessionKeys) -> Option<SessionClaims> {
    match decode_session(token, keys) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "session token rejected");
            None
        }
    }
}
