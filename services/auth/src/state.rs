use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use tabi_auth_types::cookie::CookieOptions;
use tabi_auth_types::token::SessionKeys;

use crate::domain::types::LoginPolicy;
use crate::infra::db::{DbIdentityRepository, DbIpBanRepository, DbLoginCodeRepository};
use crate::infra::notifier::AppNotifier;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub notifier: AppNotifier,
    pub keys: SessionKeys,
    pub login_policy: LoginPolicy,
    pub cookie: CookieOptions,
}

impl AppState {
    pub fn identity_repo(&self) -> DbIdentityRepository {
        DbIdentityRepository {
            db: self.db.clone(),
        }
    }

    pub fn login_code_repo(&self) -> DbLoginCodeRepository {
        DbLoginCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn ip_ban_repo(&self) -> DbIpBanRepository {
        DbIpBanRepository {
            db: self.db.clone(),
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}
