use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabi_auth_types::{
    cookie::{clear_session_cookie, set_session_cookie},
    identity::SessionIdentity,
};

use crate::domain::types::Identity;
use crate::error::AuthServiceError;
use crate::handlers::client_ip::ClientIp;
use crate::state::AppState;
use crate::usecase::login::{RequestCodeInput, RequestCodeUseCase};
use crate::usecase::session::{CurrentIdentityUseCase, VerifyCodeUseCase};

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ── POST /auth/login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub credential: String,
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(source_address): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = RequestCodeUseCase {
        identities: state.identity_repo(),
        login_codes: state.login_code_repo(),
        bans: state.ip_ban_repo(),
        notifier: state.notifier.clone(),
        policy: state.login_policy.clone(),
    };

    let out = usecase
        .execute(RequestCodeInput {
            credential: body.credential,
            source_address,
        })
        .await
        .map_err(AuthServiceError::into_login_failure)?;

    Ok(Json(MessageResponse {
        message: out.message(),
    }))
}

// ── POST /auth/verify ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub message: &'static str,
    pub identity_id: Uuid,
}

pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AuthServiceError> {
    let usecase = VerifyCodeUseCase {
        login_codes: state.login_code_repo(),
        keys: state.keys.clone(),
    };

    let out = usecase.execute(&body.code).await?;
    tracing::info!(identity_id = %out.identity.id, "login code verified, session issued");

    let jar = set_session_cookie(jar, out.session_token, &state.cookie);
    Ok((
        jar,
        Json(VerifyResponse {
            message: "Login successful",
            identity_id: out.identity.id,
        }),
    ))
}

// ── POST /auth/logout ─────────────────────────────────────────────────────────

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = clear_session_cookie(jar, &state.cookie);
    (
        jar,
        Json(MessageResponse {
            message: "Successfully logged out",
        }),
    )
}

// ── GET /auth/me ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub delivery_address: String,
    pub is_active: bool,
    #[serde(serialize_with = "tabi_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "tabi_core::serde::to_rfc3339_ms_opt")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<Identity> for MeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            delivery_address: identity.delivery_address,
            is_active: identity.is_active,
            created_at: identity.created_at,
            last_login_at: identity.last_login_at,
        }
    }
}

pub async fn me(
    State(state): State<AppState>,
    session: SessionIdentity,
) -> Result<Json<MeResponse>, AuthServiceError> {
    let usecase = CurrentIdentityUseCase {
        identities: state.identity_repo(),
    };
    let identity = usecase.execute(session.identity_id).await?;
    Ok(Json(identity.into()))
}
