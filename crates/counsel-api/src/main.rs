//! counsel-api server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use counsel_api::services::{mailer, spawn_session_sweeper, EphemeralStore};
use counsel_api::{router, AppState, ServerConfig};
use counsel_db::{Database, PoolConfig};
use counsel_inference::{EmotionModelConfig, OpenAIBackend, RemoteEmotionClassifier};
use counsel_rag::{RagConfig, RagEngine};

/// Install the global subscriber.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to a log file, rotated daily (optional)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "counsel_api=debug,tower_http=debug")
fn init_logging() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");
    let json = log_format == "json";

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "counsel_api=debug,counsel_rag=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = match log_file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("counsel-api.log");
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
            if json {
                registry
                    .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(log_ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            if json {
                registry.with(tracing_subscriber::fmt::layer().json()).init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = log_ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let config = ServerConfig::from_env().context("loading configuration")?;

    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env())
        .await
        .context("connecting to database")?;
    db.migrate().await.context("running migrations")?;
    info!("Database ready");

    let backend = Arc::new(OpenAIBackend::from_env().context("configuring inference backend")?);
    match counsel_core::InferenceBackend::health_check(backend.as_ref()).await {
        Ok(true) => info!("Inference backend reachable"),
        _ => warn!("Inference backend not reachable, replies will fail until it is"),
    }

    let rag = Arc::new(RagEngine::new(
        backend.clone(),
        backend,
        Arc::new(db.counsel.clone()),
        Arc::new(db.chats.clone()),
        RagConfig::from_env(),
    ));
    let classifier = Arc::new(
        RemoteEmotionClassifier::new(EmotionModelConfig::from_env())
            .context("configuring emotion classifier")?,
    );
    let store = EphemeralStore::connect(config.redis_enabled, &config.redis_url).await;
    let mailer = mailer::from_config(&config.mail)?;

    let sweeper = spawn_session_sweeper(db.clone(), config.session_sweep_interval);

    let addr = config.bind_addr();
    let state = AppState::new(db, rag, classifier, store, mailer, config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}
