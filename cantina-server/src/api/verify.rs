//! Badge verification endpoint
//!
//! `POST /api/verify` (and the legacy `POST /verificar-acesso`) with
//! `{"badge_id": "..."}` or `{"matricula": "..."}`.
//!
//! Status codes: 200 granted, 401 unknown badge, 403 already granted today,
//! 400 malformed request, 503 ledger unreadable (access denied).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use cantina_common::{Error, OutcomeKind, Verification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(alias = "matricula")]
    pub badge_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// `granted`, `denied_unknown_badge`, `denied_duplicate`, or `unavailable`
    pub outcome: String,
    /// `ok`, `unauthorized`, `forbidden`, `bad_request`, `unavailable`
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub audited: bool,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        Self {
            outcome: v.outcome.as_str().to_string(),
            code: v.outcome.code().to_string(),
            message: v.message,
            name: v.name,
            timestamp: v.timestamp,
            audited: v.audited,
        }
    }
}

fn outcome_status(outcome: OutcomeKind) -> StatusCode {
    match outcome {
        OutcomeKind::Granted => StatusCode::OK,
        OutcomeKind::DeniedUnknownBadge => StatusCode::UNAUTHORIZED,
        OutcomeKind::DeniedDuplicate => StatusCode::FORBIDDEN,
    }
}

fn failure(status: StatusCode, code: &str, message: String) -> (StatusCode, Json<VerifyResponse>) {
    (
        status,
        Json(VerifyResponse {
            outcome: code.to_string(),
            code: code.to_string(),
            message,
            name: None,
            timestamp: cantina_common::time::now(),
            audited: false,
        }),
    )
}

/// POST /api/verify
pub async fn verify_badge(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> (StatusCode, Json<VerifyResponse>) {
    let badge_id = match payload {
        Ok(Json(VerifyRequest { badge_id: Some(id) })) => id,
        Ok(_) => {
            return failure(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "Badge id is required".to_string(),
            )
        }
        Err(rejection) => {
            return failure(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
        }
    };

    match state.verifier.verify(&badge_id).await {
        Ok(verification) => {
            info!(
                badge_id = %badge_id.trim(),
                outcome = %verification.outcome,
                audited = verification.audited,
                "Verification"
            );
            (outcome_status(verification.outcome), Json(verification.into()))
        }
        Err(Error::InvalidInput(msg)) => failure(StatusCode::BAD_REQUEST, "bad_request", msg),
        Err(e) => {
            error!("Verification failed, denying access: {}", e);
            failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Verification unavailable. Access denied, please try again.".to_string(),
            )
        }
    }
}
