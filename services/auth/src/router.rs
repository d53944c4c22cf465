use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use tabi_core::health::healthz;
use tabi_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    auth::{login, logout, me, verify},
    health::readyz,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Login code
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        // Session
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .with_state(state)
        // Last added runs first: the id is set before tracing sees the request.
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
}
