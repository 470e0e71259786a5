//! Ledger reset: manual (admin secret) and scheduled
//!
//! Before clearing, an optional snapshot is written: one plain-text daily
//! report per calendar day that is about to be removed. If the snapshot
//! cannot be written the ledger is left untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::ResetPolicy;
use crate::ledger::Ledger;
use crate::report::{group_by_day, render_text, summarize_records};
use crate::time::{self, DayPolicy};
use crate::{Error, Result};

/// Result of a successful reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub cleared: u64,
    pub archived: Vec<PathBuf>,
}

pub struct ResetController<L> {
    ledger: L,
    policy: DayPolicy,
    reset_policy: ResetPolicy,
    archive_dir: Option<PathBuf>,
    secret_digest: Option<[u8; 32]>,
}

impl<L: Ledger> ResetController<L> {
    /// `admin_secret = None` makes every manual reset Unauthorized;
    /// `archive_dir = None` disables snapshots
    pub fn new(
        ledger: L,
        policy: DayPolicy,
        reset_policy: ResetPolicy,
        admin_secret: Option<&str>,
        archive_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            ledger,
            policy,
            reset_policy,
            archive_dir,
            secret_digest: admin_secret.map(digest),
        }
    }

    pub fn has_admin_secret(&self) -> bool {
        self.secret_digest.is_some()
    }

    /// Secret-gated reset
    pub async fn reset_now(&self, secret: &str) -> Result<ResetOutcome> {
        if !self.secret_matches(secret) {
            warn!("Rejected manual reset: bad admin secret");
            return Err(Error::Unauthorized);
        }
        let outcome = self.reset_at(time::now()).await?;
        info!(
            "Manual reset cleared {} records ({} archive files)",
            outcome.cleared,
            outcome.archived.len()
        );
        Ok(outcome)
    }

    /// Timer-driven reset; not reachable from outside the process
    pub async fn scheduled_reset(&self) -> Result<ResetOutcome> {
        let outcome = self.reset_at(time::now()).await?;
        info!(
            "Scheduled reset cleared {} records ({} archive files)",
            outcome.cleared,
            outcome.archived.len()
        );
        Ok(outcome)
    }

    async fn reset_at(&self, now: DateTime<Utc>) -> Result<ResetOutcome> {
        // KeepToday is approximate: a record appended after `today` is
        // computed but before the delete runs is kept if it is in today.
        let today = self.policy.window_containing(now)?;
        let before = match self.reset_policy {
            ResetPolicy::Full => None,
            ResetPolicy::KeepToday => Some(&today),
        };

        let archived = match &self.archive_dir {
            Some(dir) => self.write_snapshot(dir, before.map(|w| w.start), now).await?,
            None => Vec::new(),
        };

        let cleared = self.ledger.clear(before).await?;
        Ok(ResetOutcome { cleared, archived })
    }

    async fn write_snapshot(
        &self,
        dir: &Path,
        cutoff: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PathBuf>> {
        let records: Vec<_> = self
            .ledger
            .query_history()
            .await?
            .into_iter()
            .filter(|r| cutoff.map_or(true, |c| r.timestamp < c))
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(dir).await?;
        let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let mut written = Vec::new();
        for (date, day_records) in group_by_day(&self.policy, records) {
            let path = dir.join(format!("report-{}-{}.txt", date.format("%Y-%m-%d"), stamp));
            let text = render_text(&summarize_records(date, &day_records));
            tokio::fs::write(&path, text).await?;
            written.push(path);
        }
        Ok(written)
    }

    fn secret_matches(&self, supplied: &str) -> bool {
        match &self.secret_digest {
            Some(expected) => bool::from(digest(supplied)[..].ct_eq(&expected[..])),
            None => false,
        }
    }
}

// Compared as fixed-length digests
fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}
