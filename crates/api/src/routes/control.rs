use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{auth::require_auth, AppState};

/// Authenticated runtime controls.
pub fn control_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/stop", post(stop))
        .route("/telegram-commands", get(get_commands))
        .route("/telegram-commands/enable", post(enable_commands))
        .route("/telegram-commands/disable", post(disable_commands))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

async fn get_status(State(state): State<AppState>) -> Response {
    Json(state.runtime.status().await).into_response()
}

async fn pause(State(state): State<AppState>) -> Json<Value> {
    state.runtime.pause().await;
    Json(json!({"ok": true, "paused": true}))
}

async fn resume(State(state): State<AppState>) -> Json<Value> {
    state.runtime.resume().await;
    Json(json!({"ok": true, "paused": false}))
}

/// Stops the runtime, then asks the server to shut down once this
/// response has been written.
async fn stop(State(state): State<AppState>) -> Json<Value> {
    info!("Stop requested over the control API");
    state.runtime.stop().await;
    state.request_shutdown();
    Json(json!({"ok": true, "stopped": true}))
}

// ─── Chat command toggle ──────────────────────────────────────────────────────

async fn get_commands(State(state): State<AppState>) -> Json<Value> {
    let enabled = state
        .commands
        .as_ref()
        .is_some_and(|toggle| toggle.is_enabled());
    Json(json!({
        "available": state.commands.is_some(),
        "enabled": enabled,
    }))
}

async fn enable_commands(State(state): State<AppState>) -> Response {
    set_commands(&state, true)
}

async fn disable_commands(State(state): State<AppState>) -> Response {
    set_commands(&state, false)
}

fn set_commands(state: &AppState, enabled: bool) -> Response {
    match &state.commands {
        Some(toggle) => {
            toggle.set_enabled(enabled);
            Json(json!({"ok": true, "enabled": toggle.is_enabled()})).into_response()
        }
        None => (
            StatusCode::CONFLICT,
            Json(json!({"ok": false, "error": "telegram commands not available"})),
        )
            .into_response(),
    }
}
