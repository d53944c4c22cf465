#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{BanPolicy, Delivery, Identity, IpBan, LoginCode};
use crate::error::{AuthServiceError, DeliveryError};

/// Repository for the allow-listed identity.
pub trait IdentityRepository: Send + Sync {
    /// Find the identity for `delivery_address`, creating it if absent, and stamp its
    /// last code-request time with `now`.
    async fn get_or_create(
        &self,
        delivery_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AuthServiceError>;
}

/// Repository for one-time login codes.
pub trait LoginCodeRepository: Send + Sync {
    /// Mark every unused code of `code.identity_id` as used and insert `code`
    /// (same transaction).
    async fn replace_active(&self, code: &LoginCode) -> Result<(), AuthServiceError>;

    /// Consume an unused, unexpired code whose value equals `code` exactly: mark it used,
    /// stamp the owner's last login with `now`, and return the owner (same transaction).
    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, AuthServiceError>;
}

/// Repository for per-address failure counters and bans.
pub trait IpBanRepository: Send + Sync {
    async fn find(&self, ip_address: &str) -> Result<Option<IpBan>, AuthServiceError>;

    /// Create-or-increment the record for `ip_address` under `policy` and return it.
    /// Concurrent failures from one address must all be counted.
    async fn record_failure(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
        policy: &BanPolicy,
    ) -> Result<IpBan, AuthServiceError>;

    /// Delete the record, if any.
    async fn clear(&self, ip_address: &str) -> Result<(), AuthServiceError>;
}

/// Port for delivering a login code to the identity's chat.
pub trait CodeNotifier: Send + Sync {
    async fn send_code(&self, delivery_address: &str, code: &str)
    -> Result<Delivery, DeliveryError>;
}
