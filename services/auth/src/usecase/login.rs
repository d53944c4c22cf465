use chrono::{DateTime, Utc};
use rand::RngExt;
use uuid::Uuid;

use crate::domain::repository::{
    CodeNotifier, IdentityRepository, IpBanRepository, LoginCodeRepository,
};
use crate::domain::types::{Delivery, LoginCode, LoginPolicy};
use crate::error::AuthServiceError;

/// Uniformly random 6-digit code; never has a leading zero.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(100_000..=999_999u32).to_string()
}

pub struct RequestCodeInput {
    pub credential: String,
    pub source_address: String,
}

#[derive(Debug)]
pub struct RequestCodeOutput {
    pub identity_id: Uuid,
    pub delivery: Delivery,
}

impl RequestCodeOutput {
    /// User-facing status line for the login response.
    pub fn message(&self) -> &'static str {
        match self.delivery {
            Delivery::Sent => "인증 코드가 텔레그램으로 전송되었습니다.",
            Delivery::Logged | Delivery::Failed => "인증 코드가 생성되었습니다. (개발 모드)",
        }
    }
}

pub struct RequestCodeUseCase<I, C, B, N>
where
    I: IdentityRepository,
    C: LoginCodeRepository,
    B: IpBanRepository,
    N: CodeNotifier,
{
    pub identities: I,
    pub login_codes: C,
    pub bans: B,
    pub notifier: N,
    pub policy: LoginPolicy,
}

impl<I, C, B, N> RequestCodeUseCase<I, C, B, N>
where
    I: IdentityRepository,
    C: LoginCodeRepository,
    B: IpBanRepository,
    N: CodeNotifier,
{
    pub async fn execute(
        &self,
        input: RequestCodeInput,
    ) -> Result<RequestCodeOutput, AuthServiceError> {
        self.execute_at(input, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        input: RequestCodeInput,
        now: DateTime<Utc>,
    ) -> Result<RequestCodeOutput, AuthServiceError> {
        if !self.policy.matches(&input.credential) {
            return self.reject(&input.source_address, now).await;
        }

        // 1. Successful match wipes the address's failure history
        self.bans.clear(&input.source_address).await?;

        // 2. Identity keyed by the configured chat
        let identity = self
            .identities
            .get_or_create(&self.policy.delivery_address, now)
            .await?;

        // 3. New code replaces every unused one in the same transaction
        let code = LoginCode {
            id: Uuid::now_v7(),
            identity_id: identity.id,
            code: generate_code(),
            expires_at: now + self.policy.code_ttl,
            is_used: false,
            used_at: None,
            created_at: now,
        };
        self.login_codes.replace_active(&code).await?;

        // 4. Delivery problems never fail the request
        let delivery = match self
            .notifier
            .send_code(&identity.delivery_address, &code.code)
            .await
        {
            Ok(delivery) => delivery,
            Err(e) => {
                // The caller is told the code was generated; the log is the only way to it.
                tracing::warn!(
                    error = %e,
                    identity_id = %identity.id,
                    chat_id = %identity.delivery_address,
                    code = %code.code,
                    "login code delivery failed, code logged only"
                );
                Delivery::Failed
            }
        };

        Ok(RequestCodeOutput {
            identity_id: identity.id,
            delivery,
        })
    }

    /// Reject a non-matching credential, counting the failure unless the address is
    /// already banned. Never returns `Ok`.
    async fn reject(
        &self,
        source_address: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestCodeOutput, AuthServiceError> {
        let current = self.bans.find(source_address).await?;
        if let Some(ban) = current.filter(|ban| ban.is_banned_at(now)) {
            return Err(AuthServiceError::RateLimited {
                remaining_minutes: ban.remaining_minutes(now),
            });
        }

        let ban = self
            .bans
            .record_failure(source_address, now, &self.policy.ban)
            .await?;
        if ban.is_banned_at(now) {
            tracing::warn!(
                ip = %source_address,
                failed_attempts = ban.failed_attempts,
                ban_minutes = self.policy.ban.ban_minutes(),
                "source address banned after repeated unknown credentials"
            );
            return Err(AuthServiceError::TooManyAttempts {
                ban_minutes: self.policy.ban.ban_minutes(),
            });
        }
        Err(AuthServiceError::UnknownCredential)
    }
}
