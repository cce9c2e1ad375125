//! Account lifecycle against a real PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p counsel-api -- --ignored`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use counsel_api::services::ephemeral::verification_code_key;
use counsel_api::services::{EphemeralStore, LogMailer};
use counsel_api::{router, AppState, ServerConfig};
use counsel_core::EmotionLabel;
use counsel_db::Database;
use counsel_inference::mock::{MockEmotionClassifier, MockInferenceBackend};
use counsel_rag::{RagConfig, RagEngine};

async fn call(app: &axum::Router, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_register_verify_login_delete() {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();

    let backend = MockInferenceBackend::new().with_dimension(16);
    let rag = Arc::new(RagEngine::new(
        Arc::new(backend.clone()),
        Arc::new(backend),
        Arc::new(db.counsel.clone()),
        Arc::new(db.chats.clone()),
        RagConfig::default(),
    ));
    let store = EphemeralStore::in_memory();
    let mailer = Arc::new(LogMailer::new());
    let mut config = ServerConfig::with_secret("flow-secret");
    config.rate_limit_enabled = false;
    let state = AppState::new(
        db,
        rag,
        Arc::new(MockEmotionClassifier::new(EmotionLabel::Happy, 0.9)),
        store.clone(),
        mailer.clone(),
        config,
    );
    let app = router(state);

    let email = format!("flow-{}@example.com", uuid::Uuid::new_v4().simple());
    let password = "Str0ng!pass";

    let (status, _) = call(
        &app,
        "POST",
        "/auth/register",
        None,
        json!({ "email": email, "password": password, "confirm_password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mailer.sent().len(), 1);

    // Unverified accounts cannot log in.
    let (status, _) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        "/auth/verify-email",
        None,
        json!({ "email": email, "code": "000000x" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = store
        .get(&verification_code_key(&email))
        .await
        .unwrap()
        .expect("code stored");
    let (status, _) = call(
        &app,
        "POST",
        "/auth/verify-email",
        None,
        json!({ "email": email, "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        json!({ "email": email, "password": "Wr0ng!pass" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();

    // Registering the same address again conflicts.
    let (status, _) = call(
        &app,
        "POST",
        "/auth/register",
        None,
        json!({ "email": email, "password": password, "confirm_password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "DELETE", "/auth/account", Some(&access), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // The session was revoked with the account.
    let (status, _) = call(&app, "DELETE", "/auth/account", Some(&access), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
