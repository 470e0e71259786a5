//! Ledger reset endpoints
//!
//! `POST /api/reset` with `{"secret": "..."}`, or the legacy
//! `GET /api/zerar-relatorio?senha=...`. 401 for a wrong secret, 503 when the
//! ledger is unavailable, 500 for other failures (e.g. archive write).

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(alias = "senha", default)]
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: String,
    pub cleared: u64,
    pub archived: Vec<PathBuf>,
}

/// POST /api/reset
pub async fn reset_ledger(
    State(state): State<AppState>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    run_reset(&state, &request.secret).await
}

/// GET /api/zerar-relatorio?senha=...
pub async fn reset_ledger_query(
    State(state): State<AppState>,
    query: Result<Query<ResetRequest>, QueryRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    run_reset(&state, &request.secret).await
}

async fn run_reset(state: &AppState, secret: &str) -> Result<Json<ResetResponse>, ApiError> {
    let outcome = state.reset.reset_now(secret).await?;
    Ok(Json(ResetResponse {
        status: "ok".to_string(),
        cleared: outcome.cleared,
        archived: outcome.archived,
    }))
}
