//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use cantina_common::{DirectoryStatus, Ledger};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub directory: DirectoryStatus,
    /// `ok` or `unavailable`
    pub ledger: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_records: Option<u64>,
    /// Verification decisions missing from the ledger since startup
    pub unaudited_events: u64,
}

/// GET /health
///
/// Reports `degraded` when the directory failed to load or the ledger
/// cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let directory = state.verifier.directory().status().clone();
    let ledger_records = state.ledger.count().await.ok();

    let healthy = ledger_records.is_some() && !matches!(directory, DirectoryStatus::Degraded { .. });

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        module: "cantina-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        directory,
        ledger: if ledger_records.is_some() { "ok" } else { "unavailable" }.to_string(),
        ledger_records,
        unaudited_events: state.verifier.unaudited_count(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
