use axum::http::StatusCode;

/// Liveness probe for `GET /healthz`.
///
/// Readiness depends on each service's backing store, so services provide their own `/readyz`.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
