//! # counsel-api
//!
//! HTTP surface of the counseling chatbot: accounts, chat sessions and
//! counseling replies, diaries and webcam emotion tracking.
//!
//! [`router`] builds the complete axum application from an [`AppState`];
//! the `counsel-api` binary wires the state from the environment and serves it.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use handlers::{auth as auth_routes, chat, diary, emotion, health};
use middleware::{cors_layer, rate_limit_middleware, request_span, MakeRequestUuidV7};

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth_routes::register))
        .route("/verify-email", post(auth_routes::verify_email))
        .route("/verify-email-status", get(auth_routes::verify_email_status))
        .route("/verify-email-request", post(auth_routes::verify_email_request))
        .route(
            "/resend-verification-code",
            post(auth_routes::resend_verification_code),
        )
        .route("/login", post(auth_routes::login))
        .route("/refresh-token", post(auth_routes::refresh_token))
        .route("/logout", post(auth_routes::logout))
        .route(
            "/request-password-reset",
            post(auth_routes::request_password_reset),
        )
        .route("/reset-password", post(auth_routes::reset_password))
        .route("/account", delete(auth_routes::delete_account))
}

fn chat_router() -> Router<AppState> {
    Router::new()
        .route("/session", post(chat::create_session))
        .route("/message", post(chat::save_message))
        .route("/message/:message_id", delete(chat::delete_message))
        .route("/history/:user_id", get(chat::user_sessions))
        .route("/preview", post(chat::preview))
        .route("/rag-response", post(chat::rag_response))
        .route("/conversation", post(chat::conversation))
        .route("/:session_id", get(chat::session_history))
        .route("/:session_id/end", put(chat::end_session))
}

fn diary_router() -> Router<AppState> {
    Router::new()
        .route("/save", post(diary::save_diary))
        .route("/list", get(diary::list_diaries))
        .route("/search", get(diary::search_diaries))
        .route("/summary", post(diary::summarize_chat))
        .route(
            "/:id",
            get(diary::get_diary)
                .put(diary::update_diary)
                .delete(diary::delete_diary),
        )
}

fn emotion_router() -> Router<AppState> {
    Router::new()
        .route("/predict", post(emotion::predict))
        .route("/save-emotion", post(emotion::save_emotion))
        .route(
            "/results/:chatroom_id",
            get(emotion::chatroom_results).delete(emotion::delete_chatroom_results),
        )
        .route("/save-end-emotion", post(emotion::save_end_emotion))
        .route("/history", get(emotion::history))
        .route("/stats", get(emotion::statistics))
        .route("/status", get(emotion::model_status))
        .route("/auto-end", post(emotion::auto_end))
}

/// The complete application with middleware applied.
pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_body_bytes;
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/auth", auth_router())
        .nest("/chat", chat_router())
        .nest("/diary", diary_router())
        .nest("/emotion", emotion_router())
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(CatchPanicLayer::new())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}
