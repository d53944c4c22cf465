use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use uuid::Uuid;

use tabi_auth::domain::repository::{
    CodeNotifier, IdentityRepository, IpBanRepository, LoginCodeRepository,
};
use tabi_auth::domain::types::{BanPolicy, Delivery, Identity, IpBan, LoginCode, LoginPolicy};
use tabi_auth::error::{AuthServiceError, DeliveryError};
use tabi_auth::infra::notifier::{AppNotifier, LogNotifier};
use tabi_auth::state::AppState;
use tabi_auth::usecase::login::RequestCodeUseCase;
use tabi_auth_migration::{Migrator, MigratorTrait};
use tabi_auth_types::cookie::CookieOptions;
use tabi_auth_types::token::{DEFAULT_SESSION_TTL_SECS, SessionKeys};

pub const ALLOWED_EMAIL: &str = "me@x.com";
pub const CHAT_ID: &str = "5496782369";
pub const IP: &str = "203.0.113.7";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 18, 9, 0, 0).unwrap()
}

pub fn login_policy() -> LoginPolicy {
    LoginPolicy {
        allowed_credential: ALLOWED_EMAIL.to_owned(),
        delivery_address: CHAT_ID.to_owned(),
        code_ttl: Duration::minutes(15),
        ban: BanPolicy::default(),
    }
}

pub fn session_keys() -> SessionKeys {
    SessionKeys::new("integration-test-secret", "HS256", DEFAULT_SESSION_TTL_SECS).unwrap()
}

// ── MockIdentityRepo ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockIdentityRepo {
    pub identities: Arc<Mutex<Vec<Identity>>>,
}

impl MockIdentityRepo {
    pub fn new(identities: Vec<Identity>) -> Self {
        Self {
            identities: Arc::new(Mutex::new(identities)),
        }
    }

    /// Returns a shared handle to the internal identity list for post-execution inspection.
    pub fn identities_handle(&self) -> Arc<Mutex<Vec<Identity>>> {
        Arc::clone(&self.identities)
    }
}

impl IdentityRepository for MockIdentityRepo {
    async fn get_or_create(
        &self,
        delivery_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthServiceError> {
        let mut identities = self.identities.lock().unwrap();
        if let Some(existing) = identities
            .iter_mut()
            .find(|i| i.delivery_address == delivery_address)
        {
            existing.last_login_request_at = Some(now);
            return Ok(existing.clone());
        }
        let identity = Identity::new(delivery_address, now);
        identities.push(identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AuthServiceError> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }
}

// ── MockLoginCodeRepo ────────────────────────────────────────────────────────

pub struct MockLoginCodeRepo {
    pub codes: Arc<Mutex<Vec<LoginCode>>>,
    pub identities: Arc<Mutex<Vec<Identity>>>,
}

impl MockLoginCodeRepo {
    /// Code store that resolves owners through `identities`.
    pub fn new(identities: &MockIdentityRepo) -> Self {
        Self {
            codes: Arc::new(Mutex::new(vec![])),
            identities: identities.identities_handle(),
        }
    }

    pub fn codes_handle(&self) -> Arc<Mutex<Vec<LoginCode>>> {
        Arc::clone(&self.codes)
    }
}

impl LoginCodeRepository for MockLoginCodeRepo {
    async fn replace_active(&self, code: &LoginCode) -> Result<(), AuthServiceError> {
        let mut codes = self.codes.lock().unwrap();
        for c in codes
            .iter_mut()
            .filter(|c| c.identity_id == code.identity_id)
        {
            c.is_used = true;
        }
        codes.push(code.clone());
        Ok(())
    }

    async fn consume(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Identity>, AuthServiceError> {
        let mut codes = self.codes.lock().unwrap();
        let Some(found) = codes
            .iter_mut()
            .find(|c| c.code == code && c.is_valid_at(now))
        else {
            return Ok(None);
        };
        found.is_used = true;
        found.used_at = Some(now);

        let mut identities = self.identities.lock().unwrap();
        Ok(identities
            .iter_mut()
            .find(|i| i.id == found.identity_id)
            .map(|identity| {
                identity.last_login_at = Some(now);
                identity.clone()
            }))
    }
}

// ── MockIpBanRepo ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockIpBanRepo {
    pub bans: Arc<Mutex<Vec<IpBan>>>,
}

impl MockIpBanRepo {
    pub fn bans_handle(&self) -> Arc<Mutex<Vec<IpBan>>> {
        Arc::clone(&self.bans)
    }
}

impl IpBanRepository for MockIpBanRepo {
    async fn find(&self, ip_address: &str) -> Result<Option<IpBan>, AuthServiceError> {
        Ok(self
            .bans
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.ip_address == ip_address)
            .cloned())
    }

    async fn record_failure(
        &self,
        ip_address: &str,
        now: DateTime<Utc>,
        policy: &BanPolicy,
    ) -> Result<IpBan, AuthServiceError> {
        let mut bans = self.bans.lock().unwrap();
        let existing = bans
            .iter()
            .position(|b| b.ip_address == ip_address)
            .map(|idx| bans.remove(idx));
        let ban = policy.register_failure(existing, ip_address, now);
        bans.push(ban.clone());
        Ok(ban)
    }

    async fn clear(&self, ip_address: &str) -> Result<(), AuthServiceError> {
        self.bans
            .lock()
            .unwrap()
            .retain(|b| b.ip_address != ip_address);
        Ok(())
    }
}

// ── MockNotifier ─────────────────────────────────────────────────────────────

/// Records every (chat id, code) pair it is asked to deliver.
#[derive(Clone)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn sending() -> Self {
        Self {
            sent: Arc::new(Mutex::new(vec![])),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::sending()
        }
    }

    pub fn sent_handle(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.sent)
    }
}

impl CodeNotifier for MockNotifier {
    async fn send_code(
        &self,
        delivery_address: &str,
        code: &str,
    ) -> Result<Delivery, DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((delivery_address.to_owned(), code.to_owned()));
        if self.fail {
            return Err(DeliveryError::Transport("connection refused".to_owned()));
        }
        Ok(Delivery::Sent)
    }
}

// ── Use case wiring ──────────────────────────────────────────────────────────

pub struct MockHandles {
    pub identities: Arc<Mutex<Vec<Identity>>>,
    pub codes: Arc<Mutex<Vec<LoginCode>>>,
    pub bans: Arc<Mutex<Vec<IpBan>>>,
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

pub type MockRequestCode =
    RequestCodeUseCase<MockIdentityRepo, MockLoginCodeRepo, MockIpBanRepo, MockNotifier>;

/// RequestCode wired to fresh in-memory mocks.
pub fn request_code_usecase(notifier: MockNotifier) -> (MockRequestCode, MockHandles) {
    let identities = MockIdentityRepo::default();
    let login_codes = MockLoginCodeRepo::new(&identities);
    let bans = MockIpBanRepo::default();
    let handles = MockHandles {
        identities: identities.identities_handle(),
        codes: login_codes.codes_handle(),
        bans: bans.bans_handle(),
        sent: notifier.sent_handle(),
    };
    let usecase = RequestCodeUseCase {
        identities,
        login_codes,
        bans,
        notifier,
        policy: login_policy(),
    };
    (usecase, handles)
}

// ── SQLite ───────────────────────────────────────────────────────────────────

/// Fresh migrated in-memory database. One connection so every query sees the same memory db.
pub async fn sqlite_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Migrated database in a fresh file under the temp dir, with a real connection pool.
/// Remove the returned path when done.
pub async fn sqlite_file_db(pool_size: u32) -> (DatabaseConnection, PathBuf) {
    let path = std::env::temp_dir().join(format!("tabi-auth-{}.db", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(pool_size)
        .min_connections(pool_size)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    (db, path)
}

pub async fn test_state() -> AppState {
    AppState {
        db: sqlite_db().await,
        notifier: AppNotifier::Log(LogNotifier),
        keys: session_keys(),
        login_policy: login_policy(),
        cookie: CookieOptions {
            domain: None,
            secure: false,
            max_age_secs: DEFAULT_SESSION_TTL_SECS,
        },
    }
}

// ── Log capture ──────────────────────────────────────────────────────────────

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route this thread's logs into the buffer until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
