//! Report endpoints
//!
//! `GET /api/report?date=YYYY-MM-DD&view=summary|records|history&format=json|text|csv`
//! defaults to today's summary as JSON. Text and CSV are served as file
//! downloads. `GET /relatorio-diario` is today's text report.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cantina_common::report::{render_csv, render_text, summarize_records};
use cantina_common::time::parse_date;
use cantina_common::{AccessRecord, DailyWindow, ExportFormat};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportView {
    #[default]
    Summary,
    Records,
    History,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub date: Option<String>,
    #[serde(default)]
    pub view: ReportView,
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub date: NaiveDate,
    pub records: Vec<AccessRecord>,
}

/// GET /api/report
pub async fn get_report(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let window = resolve_window(&state, query.date.as_deref())?;
    let format = query
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?
        .unwrap_or(ExportFormat::Json);

    match (query.view, format) {
        (ReportView::Summary, ExportFormat::Json) => {
            let summary = state.reports.summarize(&window).await?;
            Ok(Json(summary).into_response())
        }
        (ReportView::Records, ExportFormat::Json) => {
            let records = state.reports.list_records(&window).await?;
            Ok(Json(RecordsResponse {
                date: window.date,
                records,
            })
            .into_response())
        }
        (ReportView::History, ExportFormat::Json) => {
            let history = state.reports.summarize_history().await?;
            Ok(Json(history).into_response())
        }
        (ReportView::History, format) => {
            let days = state.reports.history_by_day().await?;
            let body = match format {
                ExportFormat::Csv => {
                    let records: Vec<AccessRecord> = days.into_values().flatten().collect();
                    render_csv(&records)?
                }
                _ => days
                    .iter()
                    .map(|(date, records)| render_text(&summarize_records(*date, records)))
                    .collect::<Vec<_>>()
                    .join("\n")
                    .into_bytes(),
            };
            Ok(download(format, "history", body))
        }
        (_, format) => {
            let body = state.reports.export(&window, format).await?;
            Ok(download(format, &window.date.format("%Y-%m-%d").to_string(), body))
        }
    }
}

/// GET /relatorio-diario
pub async fn daily_text_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    let window = state.policy.today()?;
    let body = state.reports.export(&window, ExportFormat::Text).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, ExportFormat::Text.content_type())],
        body,
    )
        .into_response())
}

fn resolve_window(state: &AppState, date: Option<&str>) -> Result<DailyWindow, ApiError> {
    match date {
        Some(date) if !date.trim().is_empty() => {
            Ok(state.policy.window_for_date(parse_date(date)?)?)
        }
        _ => Ok(state.policy.today()?),
    }
}

fn download(format: ExportFormat, label: &str, body: Vec<u8>) -> Response {
    let disposition = format!(
        "attachment; filename=\"report-{}.{}\"",
        label,
        format.extension()
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
