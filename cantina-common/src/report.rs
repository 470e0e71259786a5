//! Daily report aggregation and rendering
//!
//! Reports are computed from structured ledger records on every request and
//! rendered per output format. Nothing here parses a rendered report back,
//! except [`read_csv`] for consumers of the CSV export.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::ledger::Ledger;
use crate::models::{AccessRecord, DailySummary};
use crate::time::{DailyWindow, DayPolicy};
use crate::{Error, Result};

const SEPARATOR: &str = "----------------------------------";

/// Export representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::InvalidInput(format!("Unknown export format: {}", other))),
        }
    }
}

/// JSON export body
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    summary: &'a DailySummary,
    records: &'a [AccessRecord],
}

/// One CSV row: timestamp, badge id, name, outcome
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: String,
    badge_id: String,
    name: String,
    outcome: String,
}

pub struct ReportAggregator<L> {
    ledger: L,
    policy: DayPolicy,
}

impl<L: Ledger> ReportAggregator<L> {
    pub fn new(ledger: L, policy: DayPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> &DayPolicy {
        &self.policy
    }

    pub async fn summarize(&self, window: &DailyWindow) -> Result<DailySummary> {
        let records = self.ledger.query_window(window, None).await?;
        Ok(summarize_records(window.date, &records))
    }

    /// Row-level detail, ascending by timestamp
    pub async fn list_records(&self, window: &DailyWindow) -> Result<Vec<AccessRecord>> {
        let mut records = self.ledger.query_window(window, None).await?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    /// One summary per calendar day present in the ledger, oldest first
    pub async fn summarize_history(&self) -> Result<Vec<DailySummary>> {
        let records = self.ledger.query_history().await?;
        Ok(group_by_day(&self.policy, records)
            .into_iter()
            .map(|(date, records)| summarize_records(date, &records))
            .collect())
    }

    /// Full ledger contents grouped by calendar day
    pub async fn history_by_day(&self) -> Result<BTreeMap<NaiveDate, Vec<AccessRecord>>> {
        let records = self.ledger.query_history().await?;
        Ok(group_by_day(&self.policy, records))
    }

    pub async fn export(&self, window: &DailyWindow, format: ExportFormat) -> Result<Vec<u8>> {
        let records = self.list_records(window).await?;
        let summary = summarize_records(window.date, &records);
        match format {
            ExportFormat::Text => Ok(render_text(&summary).into_bytes()),
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(&JsonReport {
                summary: &summary,
                records: &records,
            })
            .map_err(|e| Error::Internal(format!("JSON export failed: {}", e)))?),
            ExportFormat::Csv => render_csv(&records),
        }
    }
}

/// Count totals and collect denied badge ids (each id once)
pub fn summarize_records(date: NaiveDate, records: &[AccessRecord]) -> DailySummary {
    let granted_count = records.iter().filter(|r| r.outcome.is_granted()).count() as u64;
    let denied_badge_ids: BTreeSet<String> = records
        .iter()
        .filter(|r| r.outcome.is_denied())
        .map(|r| r.badge_id.clone())
        .collect();

    DailySummary {
        date,
        total_requests: records.len() as u64,
        granted_count,
        denied_badge_ids,
    }
}

pub(crate) fn group_by_day(
    policy: &DayPolicy,
    records: Vec<AccessRecord>,
) -> BTreeMap<NaiveDate, Vec<AccessRecord>> {
    let mut days: BTreeMap<NaiveDate, Vec<AccessRecord>> = BTreeMap::new();
    for record in records {
        days.entry(policy.local_date(record.timestamp))
            .or_default()
            .push(record);
    }
    days
}

/// Fixed plain-text daily report
pub fn render_text(summary: &DailySummary) -> String {
    let denied = if summary.denied_badge_ids.is_empty() {
        "none".to_string()
    } else {
        summary
            .denied_badge_ids
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    let _ = writeln!(out, "Daily Report - {}", summary.date.format("%Y-%m-%d"));
    let _ = writeln!(out, "{}", SEPARATOR);
    let _ = writeln!(out, "Total requests: {}", summary.total_requests);
    let _ = writeln!(out, "Access granted: {}", summary.granted_count);
    let _ = writeln!(out, "Denied badges: {}", denied);
    let _ = writeln!(out, "{}", SEPARATOR);
    out
}

/// Header row plus one row per record
pub fn render_csv(records: &[AccessRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(CsvRow {
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            badge_id: record.badge_id.clone(),
            name: record.resolved_name.clone(),
            outcome: record.outcome.as_str().to_string(),
        })?;
    }
    if records.is_empty() {
        writer.write_record(["timestamp", "badge_id", "name", "outcome"])?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV export failed: {}", e)))
}

/// Parse a CSV export back into records
pub fn read_csv(bytes: &[u8]) -> Result<Vec<AccessRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: CsvRow = row?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", row.timestamp, e)))?
            .with_timezone(&Utc);
        records.push(AccessRecord {
            badge_id: row.badge_id,
            resolved_name: row.name,
            outcome: row.outcome.parse()?,
            timestamp,
        });
    }
    Ok(records)
}
