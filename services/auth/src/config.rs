use std::fmt;
use std::str::FromStr;

use anyhow::{Context as _, anyhow, bail};
use chrono::{Duration, Utc};

use tabi_auth_types::cookie::CookieOptions;
use tabi_auth_types::token::SessionKeys;

use crate::domain::types::{
    BanPolicy, DEFAULT_BAN_DURATION_MINUTES, DEFAULT_LOGIN_CODE_TTL_MINUTES,
    DEFAULT_MAX_LOGIN_ATTEMPTS, LoginPolicy,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/tabi.db?mode=rwc";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Auth service configuration loaded from environment variables.
pub struct AuthConfig {
    /// sea-orm connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// Session signing secret. Env var: `SECRET_KEY` (required).
    pub secret_key: String,
    /// HMAC algorithm name (default "HS256"). Env var: `ALGORITHM`.
    pub algorithm: String,
    /// Session lifetime and cookie Max-Age (default 15). Env var: `ACCESS_TOKEN_EXPIRE_MINUTES`.
    pub session_ttl_minutes: u64,
    /// One-time code lifetime (default 15). Env var: `LOGIN_CODE_EXPIRE_MINUTES`.
    pub login_code_ttl_minutes: i64,
    /// The single allow-listed credential. Env var: `ALLOWED_EMAIL` (required).
    pub allowed_email: String,
    /// Telegram chat that receives login codes. Env var: `TELEGRAM_CHAT_ID` (required).
    pub telegram_chat_id: String,
    /// Bot token; codes are only logged when unset. Env var: `TELEGRAM_BOT_TOKEN`.
    pub telegram_bot_token: Option<String>,
    /// Bot API base URL. Env var: `TELEGRAM_API_URL`.
    pub telegram_api_url: String,
    /// Wrong-credential attempts before a ban (default 5). Env var: `MAX_LOGIN_ATTEMPTS`.
    pub max_login_attempts: u32,
    /// Ban length (default 10). Env var: `BAN_DURATION_MINUTES`.
    pub ban_duration_minutes: i64,
    /// `Secure` cookie attribute (default false). Env var: `COOKIE_SECURE`.
    pub cookie_secure: bool,
    /// `Domain` cookie attribute. Env var: `COOKIE_DOMAIN`.
    pub cookie_domain: Option<String>,
    /// TCP port to listen on (default 8000). Env var: `AUTH_PORT`.
    pub auth_port: u16,
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            secret_key: get("SECRET_KEY").context("SECRET_KEY must be set")?,
            algorithm: get("ALGORITHM").unwrap_or_else(|| "HS256".to_owned()),
            session_ttl_minutes: parse_or(&get, "ACCESS_TOKEN_EXPIRE_MINUTES", 15)?,
            login_code_ttl_minutes: parse_or(
                &get,
                "LOGIN_CODE_EXPIRE_MINUTES",
                DEFAULT_LOGIN_CODE_TTL_MINUTES,
            )?,
            allowed_email: get("ALLOWED_EMAIL").context("ALLOWED_EMAIL must be set")?,
            telegram_chat_id: get("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID must be set")?,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_owned()),
            max_login_attempts: parse_or(&get, "MAX_LOGIN_ATTEMPTS", DEFAULT_MAX_LOGIN_ATTEMPTS)?,
            ban_duration_minutes: parse_or(
                &get,
                "BAN_DURATION_MINUTES",
                DEFAULT_BAN_DURATION_MINUTES,
            )?,
            cookie_secure: parse_or(&get, "COOKIE_SECURE", false)?,
            cookie_domain: get("COOKIE_DOMAIN"),
            auth_port: parse_or(&get, "AUTH_PORT", 8000)?,
        };

        if config.session_ttl_minutes == 0 || config.login_code_ttl_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES and LOGIN_CODE_EXPIRE_MINUTES must be positive");
        }
        if config.max_login_attempts == 0 {
            bail!("MAX_LOGIN_ATTEMPTS must be at least 1");
        }
        if config.ban_duration_minutes <= 0 {
            bail!("BAN_DURATION_MINUTES must be positive");
        }
        config.session_ttl_secs()?;
        config.login_policy()?;
        Ok(config)
    }

    fn session_ttl_secs(&self) -> anyhow::Result<u64> {
        i64::try_from(self.session_ttl_minutes)
            .ok()
            .and_then(|m| m.checked_mul(60))
            .and_then(|secs| u64::try_from(secs).ok())
            .context("ACCESS_TOKEN_EXPIRE_MINUTES is out of range")
    }

    pub fn session_keys(&self) -> anyhow::Result<SessionKeys> {
        SessionKeys::new(
            self.secret_key.clone(),
            &self.algorithm,
            self.session_ttl_secs()?,
        )
        .context("ALGORITHM")
    }

    pub fn login_policy(&self) -> anyhow::Result<LoginPolicy> {
        Ok(LoginPolicy {
            allowed_credential: self.allowed_email.clone(),
            delivery_address: self.telegram_chat_id.clone(),
            code_ttl: minutes("LOGIN_CODE_EXPIRE_MINUTES", self.login_code_ttl_minutes)?,
            ban: BanPolicy {
                max_attempts: self.max_login_attempts,
                ban_duration: minutes("BAN_DURATION_MINUTES", self.ban_duration_minutes)?,
            },
        })
    }

    pub fn cookie_options(&self) -> anyhow::Result<CookieOptions> {
        Ok(CookieOptions {
            domain: self.cookie_domain.clone(),
            secure: self.cookie_secure,
            max_age_secs: self.session_ttl_secs()?,
        })
    }
}

/// `value` minutes as a `Duration` that can still be added to the current time.
fn minutes(key: &str, value: i64) -> anyhow::Result<Duration> {
    Duration::try_minutes(value)
        .filter(|d| Utc::now().checked_add_signed(*d).is_some())
        .with_context(|| format!("{key}: {value} minutes is out of range"))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key}: invalid value {raw:?}: {e}")),
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("database_url", &self.database_url)
            .field("secret_key", &"[redacted]")
            .field("algorithm", &self.algorithm)
            .field("session_ttl_minutes", &self.session_ttl_minutes)
            .field("login_code_ttl_minutes", &self.login_code_ttl_minutes)
            .field("allowed_email", &self.allowed_email)
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "[redacted]"),
            )
            .field("telegram_api_url", &self.telegram_api_url)
            .field("max_login_attempts", &self.max_login_attempts)
            .field("ban_duration_minutes", &self.ban_duration_minutes)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_domain", &self.cookie_domain)
            .field("auth_port", &self.auth_port)
            .finish()
    }
}
