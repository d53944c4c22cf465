use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Auth service domain error variants.
///
/// Messages are shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("등록되지 않은 이메일입니다.")]
    UnknownCredential,
    #[error("IP가 차단되었습니다. {remaining_minutes}분 후 다시 시도하세요.")]
    RateLimited { remaining_minutes: i64 },
    #[error("너무 많은 실패로 인해 {ban_minutes}분간 접속이 제한됩니다.")]
    TooManyAttempts { ban_minutes: i64 },
    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
    /// Unexpected failure while issuing a login code.
    #[error("로그인 코드 전송에 실패했습니다.")]
    LoginCodeFailed(anyhow::Error),
}

impl AuthServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCredential => "UNKNOWN_CREDENTIAL",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::TooManyAttempts { .. } => "TOO_MANY_ATTEMPTS",
            Self::InvalidOrExpiredCode => "INVALID_OR_EXPIRED_CODE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Internal(_) | Self::LoginCodeFailed(_) => "INTERNAL",
        }
    }

    /// Reword an internal failure for `POST /auth/login`.
    pub fn into_login_failure(self) -> Self {
        match self {
            Self::Internal(e) => Self::LoginCodeFailed(e),
            other => other,
        }
    }
}

impl IntoResponse for AuthServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnknownCredential
            | Self::RateLimited { .. }
            | Self::TooManyAttempts { .. }
            | Self::InvalidOrExpiredCode => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Internal(_) | Self::LoginCodeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // tower-http TraceLayer already records method/uri/status for every request;
        // only 500s need the anyhow chain.
        if let Self::Internal(ref e) | Self::LoginCodeFailed(ref e) = self {
            tracing::error!(error = %format!("{e:#}"), kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Failure to hand a login code to Telegram. Never fails the login request.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("telegram request failed: {0}")]
    Transport(String),
    #[error("telegram rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
