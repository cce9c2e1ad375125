//! Liveness and dependency status.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::services::StoreBackend;
use crate::AppState;

/// `{status, version, database, redis}`. Always 200; `status` is
/// `degraded` when the database or a configured Redis cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.ping().await;
    let redis = match state.store.backend() {
        StoreBackend::Redis if state.store.ping().await => "connected",
        StoreBackend::Redis => "unreachable",
        StoreBackend::Memory => "disabled",
    };
    let healthy = database && redis != "unreachable";

    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": if database { "connected" } else { "unreachable" },
        "redis": redis,
    }))
}
