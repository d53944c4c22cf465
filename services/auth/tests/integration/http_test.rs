use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use tabi_auth::router::build_router;
use tabi_auth_schema::login_codes;
use tabi_core::middleware::X_REQUEST_ID;
use tabi_testing::auth::MockSession;

use crate::helpers::{ALLOWED_EMAIL, CHAT_ID, session_keys, test_state};

async fn create_app() -> (Router, DatabaseConnection) {
    let state = test_state().await;
    let db = state.db.clone();
    (build_router(state), db)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn login_from(ip: &str, credential: &str) -> Request<Body> {
    let mut request = post_json("/auth/login", json!({ "credential": credential }));
    request
        .headers_mut()
        .insert("x-forwarded-for", ip.parse().unwrap());
    request
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .to_owned()
}

async fn active_code(db: &DatabaseConnection) -> String {
    login_codes::Entity::find()
        .filter(login_codes::Column::IsUsed.eq(false))
        .one(db)
        .await
        .unwrap()
        .expect("an unused login code")
        .code
}

#[tokio::test]
async fn should_report_health_and_readiness() {
    let (app, _db) = create_app().await;

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn should_attach_request_id_to_responses() {
    let (app, _db) = create_app().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    let id = response.headers().get(X_REQUEST_ID).expect("request id");
    assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn should_complete_login_flow() {
    let (app, db) = create_app().await;

    // 1. Request a code through the legacy `email` field
    let response = app
        .clone()
        .oneshot(post_json("/auth/login", json!({ "email": "ME@x.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "인증 코드가 생성되었습니다. (개발 모드)");

    // 2. Exchange it for a session cookie
    let code = active_code(&db).await;
    let response = app
        .clone()
        .oneshot(post_json("/auth/verify", json!({ "code": code })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("session_token="));
    for attr in ["HttpOnly", "SameSite=Lax", "Path=/", "Max-Age=900"] {
        assert!(cookie.contains(attr), "missing {attr} in {cookie}");
    }
    assert!(!cookie.contains("; Secure"));
    let body = body_json(response).await;
    assert_eq!(body["message"], "Login successful");
    let identity_id = body["identityId"].as_str().unwrap().to_owned();

    // 3. The cookie authenticates /auth/me
    let session_pair = cookie.split(';').next().unwrap().to_owned();
    let request = Request::builder()
        .uri("/auth/me")
        .header(header::COOKIE, session_pair)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["id"], identity_id.as_str());
    assert_eq!(me["deliveryAddress"], CHAT_ID);
    assert_eq!(me["isActive"], true);
    assert!(me["createdAt"].as_str().unwrap().ends_with('Z'));
    assert!(me["lastLoginAt"].is_string());

    // 4. The code is single-use
    let response = app
        .clone()
        .oneshot(post_json("/auth/verify", json!({ "code": code })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 5. Logout expires the cookie
    let response = app
        .oneshot(post_json("/auth/logout", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.contains("Max-Age=0"), "{cookie}");
    let body = body_json(response).await;
    assert_eq!(body["message"], "Successfully logged out");
}

#[tokio::test]
async fn should_reject_unknown_credential() {
    let (app, _db) = create_app().await;

    let response = app
        .oneshot(login_from("203.0.113.7", "other@x.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "UNKNOWN_CREDENTIAL");
    assert_eq!(body["message"], "등록되지 않은 이메일입니다.");
}

#[tokio::test]
async fn should_ban_forwarded_address_after_repeated_failures() {
    let (app, _db) = create_app().await;
    let ip = "203.0.113.7";

    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(login_from(ip, "other@x.com"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["kind"], "UNKNOWN_CREDENTIAL");
    }

    let response = app
        .clone()
        .oneshot(login_from(ip, "other@x.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "TOO_MANY_ATTEMPTS");
    assert_eq!(
        body["message"],
        "너무 많은 실패로 인해 10분간 접속이 제한됩니다."
    );

    let response = app
        .clone()
        .oneshot(login_from(ip, "other@x.com"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["kind"], "RATE_LIMITED");
    assert_eq!(body["message"], "IP가 차단되었습니다. 10분 후 다시 시도하세요.");

    // Other addresses are unaffected.
    let response = app
        .oneshot(login_from("198.51.100.2", "other@x.com"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["kind"], "UNKNOWN_CREDENTIAL");
}

#[tokio::test]
async fn should_reject_wrong_code() {
    let (app, _db) = create_app().await;

    let response = app
        .oneshot(post_json("/auth/verify", json!({ "code": "000000" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["kind"], "INVALID_OR_EXPIRED_CODE");
    assert_eq!(body["message"], "Invalid or expired code");
}

#[tokio::test]
async fn should_require_session_for_me() {
    let (app, _db) = create_app().await;

    let response = app.clone().oneshot(get("/auth/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["kind"], "UNAUTHENTICATED");

    let expired = MockSession::expired(Uuid::now_v7(), &session_keys());
    let (name, value) = expired.bearer_header();
    let request = Request::builder()
        .uri("/auth/me")
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid signature but no such identity.
    let ghost = MockSession::new(Uuid::now_v7(), &session_keys());
    let (name, value) = ghost.cookie_header();
    let request = Request::builder()
        .uri("/auth/me")
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Not authenticated");
}

#[tokio::test]
async fn should_accept_bearer_session_for_me() {
    let (app, db) = create_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/auth/login", json!({ "credential": ALLOWED_EMAIL })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .clone()
        .oneshot(post_json("/auth/verify", json!({ "code": active_code(&db).await })))
        .await
        .unwrap();
    let identity_id: Uuid = body_json(response).await["identityId"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let session = MockSession::new(identity_id, &session_keys());
    let (name, value) = session.bearer_header();
    let request = Request::builder()
        .uri("/auth/me")
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], identity_id.to_string());
}
