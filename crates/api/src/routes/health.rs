use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness check. No auth required.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let running = state.runtime.status().await.running;
    Json(json!({
        "status": "ok",
        "running": running,
    }))
}
