//! Append-only access ledger
//!
//! [`Ledger`] is the storage seam: append, window queries and bulk clear.
//! Each call is individually atomic; there are no cross-call transactions.
//! [`SqliteLedger`] is the durable production store and bounds every call
//! with the configured storage timeout.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;

use crate::models::{AccessRecord, OutcomeKind};
use crate::time::DailyWindow;
use crate::{Error, Result};

/// Durable store of access attempts
pub trait Ledger: Send + Sync {
    /// Persist one record
    fn append(&self, record: &AccessRecord) -> impl Future<Output = Result<()>> + Send;

    /// Records inside `window`, optionally for one badge, ascending by timestamp
    fn query_window(
        &self,
        window: &DailyWindow,
        badge_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<AccessRecord>>> + Send;

    /// Every record, ascending by timestamp
    fn query_history(&self) -> impl Future<Output = Result<Vec<AccessRecord>>> + Send;

    /// Delete records; with `before`, only those older than the window start
    fn clear(&self, before: Option<&DailyWindow>) -> impl Future<Output = Result<u64>> + Send;

    /// Number of stored records
    fn count(&self) -> impl Future<Output = Result<u64>> + Send;
}

type RecordRow = (String, String, String, i64);

/// SQLite-backed ledger over the `access_records` table
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::StorageTimeout(self.timeout)),
        }
    }
}

impl Ledger for SqliteLedger {
    async fn append(&self, record: &AccessRecord) -> Result<()> {
        self.bounded(
            sqlx::query(
                "INSERT INTO access_records (badge_id, resolved_name, outcome, timestamp_ms)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&record.badge_id)
            .bind(&record.resolved_name)
            .bind(record.outcome.as_str())
            .bind(record.timestamp.timestamp_millis())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn query_window(
        &self,
        window: &DailyWindow,
        badge_id: Option<&str>,
    ) -> Result<Vec<AccessRecord>> {
        let start = window.start.timestamp_millis();
        let end = window.end.timestamp_millis();

        let rows: Vec<RecordRow> = match badge_id {
            Some(badge_id) => {
                self.bounded(
                    sqlx::query_as(
                        "SELECT badge_id, resolved_name, outcome, timestamp_ms
                         FROM access_records
                         WHERE badge_id = ? AND timestamp_ms >= ? AND timestamp_ms < ?
                         ORDER BY timestamp_ms ASC, id ASC",
                    )
                    .bind(badge_id)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool),
                )
                .await?
            }
            None => {
                self.bounded(
                    sqlx::query_as(
                        "SELECT badge_id, resolved_name, outcome, timestamp_ms
                         FROM access_records
                         WHERE timestamp_ms >= ? AND timestamp_ms < ?
                         ORDER BY timestamp_ms ASC, id ASC",
                    )
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool),
                )
                .await?
            }
        };

        rows.into_iter().map(record_from_row).collect()
    }

    async fn query_history(&self) -> Result<Vec<AccessRecord>> {
        let rows: Vec<RecordRow> = self
            .bounded(
                sqlx::query_as(
                    "SELECT badge_id, resolved_name, outcome, timestamp_ms
                     FROM access_records
                     ORDER BY timestamp_ms ASC, id ASC",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn clear(&self, before: Option<&DailyWindow>) -> Result<u64> {
        let result = match before {
            Some(window) => {
                self.bounded(
                    sqlx::query("DELETE FROM access_records WHERE timestamp_ms < ?")
                        .bind(window.start.timestamp_millis())
                        .execute(&self.pool),
                )
                .await?
            }
            None => {
                self.bounded(sqlx::query("DELETE FROM access_records").execute(&self.pool))
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = self
            .bounded(sqlx::query_scalar("SELECT COUNT(*) FROM access_records").fetch_one(&self.pool))
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn record_from_row((badge_id, resolved_name, outcome, timestamp_ms): RecordRow) -> Result<AccessRecord> {
    let outcome: OutcomeKind = outcome
        .parse()
        .map_err(|_| Error::Internal(format!("Corrupt outcome in ledger: {}", outcome)))?;
    let timestamp = millis_to_utc(timestamp_ms)?;
    Ok(AccessRecord {
        badge_id,
        resolved_name,
        outcome,
        timestamp,
    })
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::Internal(format!("Corrupt timestamp in ledger: {}", millis)))
}
