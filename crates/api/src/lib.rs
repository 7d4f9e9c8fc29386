mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde_json::json;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use common::{CommandToggle, Result};
use engine::TradingRuntime;

pub use auth::TokenVerifier;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub runtime: TradingRuntime,
    /// Present only when a chat command poller is running.
    pub commands: Option<Arc<dyn CommandToggle>>,
    pub verifier: Arc<TokenVerifier>,
    shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(
        runtime: TradingRuntime,
        commands: Option<Arc<dyn CommandToggle>>,
        api_token: &str,
    ) -> Result<Self> {
        Ok(Self {
            runtime,
            commands,
            verifier: Arc::new(TokenVerifier::new(api_token)?),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Ask `serve` to finish in-flight requests and return.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::control_router(state.clone()))
        .merge(routes::health_router())
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}

/// Bind `addr` and serve the control API until `request_shutdown` is called.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Control API listening");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    info!("Control API shut down");
    Ok(())
}
