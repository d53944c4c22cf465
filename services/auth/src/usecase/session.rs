use chrono::{DateTime, Utc};
use uuid::Uuid;

use tabi_auth_types::token::{SessionKeys, issue_session_at};

use crate::domain::repository::{IdentityRepository, LoginCodeRepository};
use crate::domain::types::Identity;
use crate::error::AuthServiceError;

// ── VerifyCode (login) ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct VerifyCodeOutput {
    pub identity: Identity,
    pub session_token: String,
    pub expires_at: u64,
}

pub struct VerifyCodeUseCase<C: LoginCodeRepository> {
    pub login_codes: C,
    pub keys: SessionKeys,
}

impl<C: LoginCodeRepository> VerifyCodeUseCase<C> {
    pub async fn execute(&self, code: &str) -> Result<VerifyCodeOutput, AuthServiceError> {
        self.execute_at(code, Utc::now()).await
    }

    /// Consume `code` and sign a session issued at `now`. Wrong codes are not
    /// counted against the caller's address.
    pub async fn execute_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyCodeOutput, AuthServiceError> {
        let identity = self
            .login_codes
            .consume(code, now)
            .await?
            .ok_or(AuthServiceError::InvalidOrExpiredCode)?;

        let issued_at = u64::try_from(now.timestamp()).unwrap_or(0);
        let session = issue_session_at(identity.id, &self.keys, issued_at)
            .map_err(|e| AuthServiceError::Internal(e.into()))?;

        Ok(VerifyCodeOutput {
            identity,
            session_token: session.token,
            expires_at: session.expires_at,
        })
    }
}

// ── CurrentIdentity ───────────────────────────────────────────────────────────

pub struct CurrentIdentityUseCase<I: IdentityRepository> {
    pub identities: I,
}

impl<I: IdentityRepository> CurrentIdentityUseCase<I> {
    pub async fn execute(&self, identity_id: Uuid) -> Result<Identity, AuthServiceError> {
        self.identities
            .find_by_id(identity_id)
            .await?
            .filter(|identity| identity.is_active)
            .ok_or(AuthServiceError::Unauthenticated)
    }
}
