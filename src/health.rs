//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, the app tag, and the shared connection's backend,
//! namespace and lease counters. Reports `closing` once the connection
//! pool has been closed.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::pool::Backend;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub app: String,
    pub database: DatabaseHealth,
}

#[derive(Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub backend: String,
    pub namespace: String,
    pub acquired: u64,
    pub released: u64,
    pub active: u64,
}

pub async fn health_handler<B: Backend>(State(state): State<AppState<B>>) -> Json<HealthResponse> {
    let handle = &state.handle;
    let stats = handle.stats();

    let status = if handle.is_closed() {
        "closing"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        app: state.access_log.app().to_string(),
        database: DatabaseHealth {
            backend: handle.kind().to_string(),
            namespace: handle.namespace().to_string(),
            acquired: stats.acquired,
            released: stats.released,
            active: stats.active,
        },
    })
}
