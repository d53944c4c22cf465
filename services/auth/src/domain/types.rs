use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// The single allow-listed principal, keyed by its Telegram chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub delivery_address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_request_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// A fresh active identity whose first code request happens at `now`.
    pub fn new(delivery_address: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            delivery_address: delivery_address.to_owned(),
            is_active: true,
            created_at: now,
            last_login_at: None,
            last_login_request_at: Some(now),
        }
    }
}

/// One-time 6-digit login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCode {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LoginCode {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }
}

/// Failed-attempt counter and ban window for one source address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpBan {
    pub id: Uuid,
    pub ip_address: String,
    pub failed_attempts: u32,
    pub banned_until: Option<DateTime<Utc>>,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

impl IpBan {
    pub fn is_banned_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.banned_until, Some(until) if until > now)
    }

    /// Whole minutes left on the ban, rounded up. Zero when not banned.
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.banned_until
            .map(|until| (until - now).num_seconds())
            .filter(|secs| *secs > 0)
            .map(|secs| (secs + 59) / 60)
            .unwrap_or(0)
    }
}

/// Failure threshold and ban length for wrong-credential attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanPolicy {
    pub max_attempts: u32,
    pub ban_duration: Duration,
}

impl Default for BanPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            ban_duration: Duration::minutes(DEFAULT_BAN_DURATION_MINUTES),
        }
    }
}

impl BanPolicy {
    pub fn ban_minutes(&self) -> i64 {
        self.ban_duration.num_minutes()
    }

    /// Apply one failed attempt from `ip_address` to its current record.
    ///
    /// Starts a new record at 1 when there is none. Once the counter is at or past
    /// `max_attempts`, a ban starts at `now` unless one is still running; an active
    /// ban window is never extended.
    pub fn register_failure(
        &self,
        existing: Option<IpBan>,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> IpBan {
        let mut ban = match existing {
            Some(mut ban) => {
                ban.failed_attempts = ban.failed_attempts.saturating_add(1);
                ban.last_attempt_at = now;
                ban
            }
            None => IpBan {
                id: Uuid::now_v7(),
                ip_address: ip_address.to_owned(),
                failed_attempts: 1,
                banned_until: None,
                first_attempt_at: now,
                last_attempt_at: now,
            },
        };
        if ban.failed_attempts >= self.max_attempts && !ban.is_banned_at(now) {
            ban.banned_until = Some(now + self.ban_duration);
        }
        ban
    }
}

/// Who may log in, where the code goes, and how long codes and bans last.
#[derive(Debug, Clone)]
pub struct LoginPolicy {
    pub allowed_credential: String,
    pub delivery_address: String,
    pub code_ttl: Duration,
    pub ban: BanPolicy,
}

impl LoginPolicy {
    /// Case-insensitive comparison against the allow-listed credential.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.to_lowercase() == self.allowed_credential.to_lowercase()
    }
}

/// Outcome of handing a login code to the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message reached the Telegram Bot API.
    Sent,
    /// No bot is configured; the code only went to the log.
    Logged,
    /// The notifier failed. The code stays valid.
    Failed,
}

/// Login code length in digits.
pub const LOGIN_CODE_LEN: usize = 6;

/// Login code time-to-live in minutes.
pub const DEFAULT_LOGIN_CODE_TTL_MINUTES: i64 = 15;

/// Wrong-credential attempts from one address before it is banned.
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Ban length in minutes.
pub const DEFAULT_BAN_DURATION_MINUTES: i64 = 10;
