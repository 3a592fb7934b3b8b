// src/api.rs
//! Keep-alive HTTP server: liveness for the hosting platform, a JSON status
//! view and Prometheus metrics.

use axum::{extract::State, routing::get, Json, Router};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use crate::status::StatusSnapshot;

pub const ALIVE_TEXT: &str = "✅ Asthra Bot is Alive";

#[derive(Clone)]
pub struct AppState {
    pub status: watch::Receiver<StatusSnapshot>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { ALIVE_TEXT }))
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.borrow().clone())
}

/// Bind and serve until the task is dropped. Bind failures are logged only.
pub async fn serve(addr: String, router: Router) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "keep-alive server could not bind");
            return;
        }
    };
    tracing::info!(%addr, "keep-alive server started");
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "keep-alive server stopped");
    }
}
