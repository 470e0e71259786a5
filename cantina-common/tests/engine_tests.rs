//! Integration tests for verification, reporting and reset
//!
//! Tests cover:
//! - Grant / duplicate / unknown-badge decisions and their ledger records
//! - Day rollover re-enables access
//! - Daily summaries and exports (CSV round trip)
//! - Secret-gated and scheduled reset, snapshot archive
//! - Degraded behavior when the ledger fails

use cantina_common::config::ResetPolicy;
use cantina_common::db::init::init_database;
use cantina_common::report::read_csv;
use cantina_common::{
    time, AccessRecord, DailyWindow, DayPolicy, Directory, Employee, Error, ExportFormat, Ledger,
    OutcomeKind, ReportAggregator, ResetController, Result, SqliteLedger, VerificationService,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(2);
const SECRET: &str = "s3cret-admin";

async fn setup_ledger() -> (TempDir, SqliteLedger) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = init_database(&dir.path().join("cantina.db"), TIMEOUT)
        .await
        .expect("Should initialize database");
    (dir, SqliteLedger::new(pool, TIMEOUT))
}

fn directory() -> Arc<Directory> {
    Arc::new(Directory::from_entries(vec![Employee {
        badge_id: "1001".to_string(),
        name: "Ana".to_string(),
    }]))
}

fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, min, 0).unwrap()
}

fn day(day: u32) -> DailyWindow {
    DayPolicy::utc()
        .window_for_date(NaiveDate::from_ymd_opt(2024, 3, day).unwrap())
        .unwrap()
}

/// Ledger whose every operation fails
struct UnavailableLedger;

impl Ledger for UnavailableLedger {
    async fn append(&self, _record: &AccessRecord) -> Result<()> {
        Err(Error::StorageTimeout(TIMEOUT))
    }

    async fn query_window(&self, _window: &DailyWindow, _badge_id: Option<&str>) -> Result<Vec<AccessRecord>> {
        Err(Error::StorageTimeout(TIMEOUT))
    }

    async fn query_history(&self) -> Result<Vec<AccessRecord>> {
        Err(Error::StorageTimeout(TIMEOUT))
    }

    async fn clear(&self, _before: Option<&DailyWindow>) -> Result<u64> {
        Err(Error::StorageTimeout(TIMEOUT))
    }

    async fn count(&self) -> Result<u64> {
        Err(Error::StorageTimeout(TIMEOUT))
    }
}

/// Ledger that reads normally but rejects appends
struct AppendFailsLedger(SqliteLedger);

impl Ledger for AppendFailsLedger {
    async fn append(&self, _record: &AccessRecord) -> Result<()> {
        Err(Error::StorageTimeout(TIMEOUT))
    }

    async fn query_window(&self, window: &DailyWindow, badge_id: Option<&str>) -> Result<Vec<AccessRecord>> {
        self.0.query_window(window, badge_id).await
    }

    async fn query_history(&self) -> Result<Vec<AccessRecord>> {
        self.0.query_history().await
    }

    async fn clear(&self, before: Option<&DailyWindow>) -> Result<u64> {
        self.0.clear(before).await
    }

    async fn count(&self) -> Result<u64> {
        self.0.count().await
    }
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn test_unknown_badge_denied_and_recorded_every_time() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());

    for minute in 0..3 {
        let result = service.verify_at("9999", at(10, 9, minute)).await.unwrap();
        assert_eq!(result.outcome, OutcomeKind::DeniedUnknownBadge);
        assert!(result.name.is_none());
        assert!(result.audited);
    }

    let records = ledger.query_window(&day(10), Some("9999")).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.outcome == OutcomeKind::DeniedUnknownBadge && r.resolved_name == "Unknown"));
}

#[tokio::test]
async fn test_daily_scenario() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger.clone(), DayPolicy::utc());

    let first = service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    assert_eq!(first.outcome, OutcomeKind::Granted);
    assert!(first.message.contains("Ana"));
    assert_eq!(first.name.as_deref(), Some("Ana"));
    assert_eq!(first.timestamp, at(10, 9, 0));

    let second = service.verify_at("1001", at(10, 9, 5)).await.unwrap();
    assert_eq!(second.outcome, OutcomeKind::DeniedDuplicate);
    assert!(second.message.contains("Ana"));
    assert!(second.message.contains("already"));

    let unknown = service.verify_at("9999", at(10, 9, 10)).await.unwrap();
    assert_eq!(unknown.outcome, OutcomeKind::DeniedUnknownBadge);

    let summary = reports.summarize(&day(10)).await.unwrap();
    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.granted_count, 1);
    assert_eq!(
        summary.denied_badge_ids,
        BTreeSet::from(["1001".to_string(), "9999".to_string()])
    );
}

#[tokio::test]
async fn test_next_day_grants_again() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger, DayPolicy::utc());

    assert_eq!(
        service.verify_at("1001", at(10, 23, 59)).await.unwrap().outcome,
        OutcomeKind::Granted
    );
    assert_eq!(
        service.verify_at("1001", at(11, 0, 0)).await.unwrap().outcome,
        OutcomeKind::Granted
    );
    assert_eq!(
        service.verify_at("1001", at(11, 12, 0)).await.unwrap().outcome,
        OutcomeKind::DeniedDuplicate
    );
}

#[tokio::test]
async fn test_day_boundary_follows_reference_offset() {
    let (_dir, ledger) = setup_ledger().await;
    let policy = DayPolicy::from_offset_minutes(-180).unwrap();
    let service = VerificationService::new(directory(), ledger, policy);

    // 22:00 and 02:00 UTC are the same local evening at UTC-3
    assert_eq!(
        service.verify_at("1001", at(10, 22, 0)).await.unwrap().outcome,
        OutcomeKind::Granted
    );
    assert_eq!(
        service.verify_at("1001", at(11, 2, 0)).await.unwrap().outcome,
        OutcomeKind::DeniedDuplicate
    );
    // 03:00 UTC is local midnight
    assert_eq!(
        service.verify_at("1001", at(11, 3, 0)).await.unwrap().outcome,
        OutcomeKind::Granted
    );
}

#[tokio::test]
async fn test_invalid_badge_not_recorded() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());

    let result = service.verify_at("   ", at(10, 9, 0)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let result = service.verify_at("10 01", at(10, 9, 0)).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    assert_eq!(ledger.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_badge_id_is_trimmed_before_lookup() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());

    let result = service.verify_at(" 1001\n", at(10, 9, 0)).await.unwrap();
    assert_eq!(result.outcome, OutcomeKind::Granted);

    let records = ledger.query_window(&day(10), Some("1001")).await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_degraded_directory_denies_everyone() {
    let (dir, ledger) = setup_ledger().await;
    let directory = Arc::new(Directory::load(&dir.path().join("missing.csv")));
    assert!(directory.is_degraded());

    let service = VerificationService::new(directory, ledger, DayPolicy::utc());
    let result = service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    assert_eq!(result.outcome, OutcomeKind::DeniedUnknownBadge);
}

#[tokio::test]
async fn test_concurrent_verifications_all_recorded() {
    let (_dir, ledger) = setup_ledger().await;
    let employees = (0..20).map(|i| Employee {
        badge_id: format!("B{}", i),
        name: format!("Person {}", i),
    });
    let service = Arc::new(VerificationService::new(
        Arc::new(Directory::from_entries(employees)),
        ledger.clone(),
        DayPolicy::utc(),
    ));

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.verify_at(&format!("B{}", i), at(10, 9, 0)).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.outcome, OutcomeKind::Granted);
    }

    assert_eq!(ledger.count().await.unwrap(), 20);
}

// =============================================================================
// Storage failures
// =============================================================================

#[tokio::test]
async fn test_append_failure_keeps_decision_but_flags_unaudited() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(
        directory(),
        AppendFailsLedger(ledger.clone()),
        DayPolicy::utc(),
    );

    let granted = service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    assert_eq!(granted.outcome, OutcomeKind::Granted);
    assert!(!granted.audited);

    let unknown = service.verify_at("9999", at(10, 9, 1)).await.unwrap();
    assert_eq!(unknown.outcome, OutcomeKind::DeniedUnknownBadge);
    assert!(!unknown.audited);

    assert_eq!(service.unaudited_count(), 2);
    assert_eq!(ledger.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreadable_ledger_refuses_known_badge() {
    let service = VerificationService::new(directory(), UnavailableLedger, DayPolicy::utc());

    let result = service.verify_at("1001", at(10, 9, 0)).await;
    assert!(matches!(result, Err(ref e) if e.is_storage()));
    assert_eq!(service.unaudited_count(), 1);

    // Unknown badges never need the duplicate check
    let unknown = service.verify_at("9999", at(10, 9, 0)).await.unwrap();
    assert_eq!(unknown.outcome, OutcomeKind::DeniedUnknownBadge);
    assert!(!unknown.audited);
    assert_eq!(service.unaudited_count(), 2);
}

#[tokio::test]
async fn test_report_unavailable_is_an_error_not_an_empty_summary() {
    let reports = ReportAggregator::new(UnavailableLedger, DayPolicy::utc());
    let result = reports.summarize(&day(10)).await;
    assert!(matches!(result, Err(ref e) if e.is_storage()));
}

// =============================================================================
// Reports
// =============================================================================

#[tokio::test]
async fn test_list_records_ascending() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger, DayPolicy::utc());

    service.verify_at("9999", at(10, 11, 0)).await.unwrap();
    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("1001", at(10, 10, 0)).await.unwrap();

    let records = reports.list_records(&day(10)).await.unwrap();
    let times: Vec<_> = records.iter().map(|r| r.timestamp).collect();
    assert_eq!(times, vec![at(10, 9, 0), at(10, 10, 0), at(10, 11, 0)]);
}

#[tokio::test]
async fn test_csv_export_round_trip() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger, DayPolicy::utc());

    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("1001", at(10, 9, 5)).await.unwrap();
    service.verify_at("9999", at(10, 9, 7)).await.unwrap();
    service.verify_at("1001", at(11, 9, 0)).await.unwrap();

    let listed = reports.list_records(&day(10)).await.unwrap();
    let exported = reports.export(&day(10), ExportFormat::Csv).await.unwrap();
    let parsed = read_csv(&exported).unwrap();

    let tuples = |records: &[AccessRecord]| -> BTreeSet<(String, String, i64)> {
        records
            .iter()
            .map(|r| (r.badge_id.clone(), r.outcome.to_string(), r.timestamp.timestamp_millis()))
            .collect()
    };
    assert_eq!(listed.len(), 3);
    assert_eq!(tuples(&parsed), tuples(&listed));
}

#[tokio::test]
async fn test_text_and_json_exports() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger, DayPolicy::utc());

    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("9999", at(10, 9, 1)).await.unwrap();

    let text = String::from_utf8(reports.export(&day(10), ExportFormat::Text).await.unwrap()).unwrap();
    assert!(text.starts_with("Daily Report - 2024-03-10"));
    assert!(text.contains("Total requests: 2"));
    assert!(text.contains("Denied badges: 9999"));

    let json: serde_json::Value =
        serde_json::from_slice(&reports.export(&day(10), ExportFormat::Json).await.unwrap()).unwrap();
    assert_eq!(json["summary"]["total_requests"], 2);
    assert_eq!(json["summary"]["granted_count"], 1);
    assert_eq!(json["records"].as_array().unwrap().len(), 2);
    assert_eq!(json["records"][0]["outcome"], "granted");
}

#[tokio::test]
async fn test_history_summaries_per_day() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger, DayPolicy::utc());

    service.verify_at("1001", at(9, 9, 0)).await.unwrap();
    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("1001", at(10, 9, 1)).await.unwrap();

    let history = reports.summarize_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    assert_eq!(history[0].total_requests, 1);
    assert_eq!(history[1].total_requests, 2);
    assert_eq!(history[1].granted_count, 1);
}

// =============================================================================
// Reset
// =============================================================================

#[tokio::test]
async fn test_reset_with_wrong_secret_leaves_ledger_unchanged() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reset = ResetController::new(ledger.clone(), DayPolicy::utc(), ResetPolicy::Full, Some(SECRET), None);

    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("9999", at(10, 9, 1)).await.unwrap();
    let before = ledger.count().await.unwrap();

    for attempt in ["", "s3cret-admi", "s3cret-admin ", "S3CRET-ADMIN"] {
        assert!(matches!(reset.reset_now(attempt).await, Err(Error::Unauthorized)));
    }

    assert_eq!(ledger.count().await.unwrap(), before);
}

#[tokio::test]
async fn test_reset_without_configured_secret_is_always_unauthorized() {
    let (_dir, ledger) = setup_ledger().await;
    let reset = ResetController::new(ledger, DayPolicy::utc(), ResetPolicy::Full, None, None);

    assert!(!reset.has_admin_secret());
    assert!(matches!(reset.reset_now("").await, Err(Error::Unauthorized)));
}

#[tokio::test]
async fn test_reset_clears_and_archives() {
    let (dir, ledger) = setup_ledger().await;
    let archive_dir = dir.path().join("archive");
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger.clone(), DayPolicy::utc());
    let reset = ResetController::new(
        ledger.clone(),
        DayPolicy::utc(),
        ResetPolicy::Full,
        Some(SECRET),
        Some(archive_dir.clone()),
    );

    service.verify_at("1001", at(9, 9, 0)).await.unwrap();
    service.verify_at("1001", at(10, 9, 0)).await.unwrap();
    service.verify_at("9999", at(10, 9, 1)).await.unwrap();

    let outcome = reset.reset_now(SECRET).await.unwrap();
    assert_eq!(outcome.cleared, 3);
    assert_eq!(outcome.archived.len(), 2);

    let summary = reports.summarize(&day(10)).await.unwrap();
    assert_eq!(summary.total_requests, 0);

    let day10 = outcome
        .archived
        .iter()
        .find(|p| p.file_name().unwrap().to_string_lossy().starts_with("report-2024-03-10-"))
        .expect("Should archive 2024-03-10");
    let text = std::fs::read_to_string(day10).unwrap();
    assert!(text.contains("Total requests: 2"));
    assert!(text.contains("Denied badges: 9999"));
}

#[tokio::test]
async fn test_reset_on_empty_ledger_writes_no_archive() {
    let (dir, ledger) = setup_ledger().await;
    let archive_dir = dir.path().join("archive");
    let reset = ResetController::new(
        ledger,
        DayPolicy::utc(),
        ResetPolicy::Full,
        Some(SECRET),
        Some(archive_dir.clone()),
    );

    let outcome = reset.reset_now(SECRET).await.unwrap();
    assert_eq!(outcome.cleared, 0);
    assert!(outcome.archived.is_empty());
    assert!(!archive_dir.exists());
}

#[tokio::test]
async fn test_scheduled_reset_clears_ledger() {
    let (_dir, ledger) = setup_ledger().await;
    let service = VerificationService::new(directory(), ledger.clone(), DayPolicy::utc());
    let reports = ReportAggregator::new(ledger.clone(), DayPolicy::utc());
    let reset = ResetController::new(ledger.clone(), DayPolicy::utc(), ResetPolicy::Full, None, None);

    service.verify("1001").await.unwrap();
    service.verify("9999").await.unwrap();

    let outcome = reset.scheduled_reset().await.unwrap();
    assert_eq!(outcome.cleared, 2);

    let summary = reports.summarize(&DayPolicy::utc().today().unwrap()).await.unwrap();
    assert_eq!(summary.total_requests, 0);
}

#[tokio::test]
async fn test_keep_today_policy_removes_only_older_days() {
    let (_dir, ledger) = setup_ledger().await;
    let reset = ResetController::new(
        ledger.clone(),
        DayPolicy::utc(),
        ResetPolicy::KeepToday,
        Some(SECRET),
        None,
    );

    let now = time::now();
    ledger
        .append(&AccessRecord::new("1001", "Ana", OutcomeKind::Granted, at(10, 9, 0)))
        .await
        .unwrap();
    ledger
        .append(&AccessRecord::new("1001", "Ana", OutcomeKind::Granted, now))
        .await
        .unwrap();

    let outcome = reset.reset_now(SECRET).await.unwrap();
    assert_eq!(outcome.cleared, 1);

    let remaining = ledger.query_history().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(DayPolicy::utc().today().unwrap().contains(remaining[0].timestamp));
}

#[tokio::test]
async fn test_reset_storage_failure_is_not_unauthorized() {
    let reset = ResetController::new(
        UnavailableLedger,
        DayPolicy::utc(),
        ResetPolicy::Full,
        Some(SECRET),
        None,
    );

    let result = reset.reset_now(SECRET).await;
    assert!(matches!(result, Err(ref e) if e.is_storage()));
}
