//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One WebSocket endpoint carries the whole protocol. The two HTTP routes are
//! operational only: a liveness check and a counter snapshot.

pub mod ws;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, RelayStats};

/// Build the relay router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .route("/api/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.relay.read().await.stats())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
