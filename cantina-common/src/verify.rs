//! Badge verification
//!
//! One request walks `Lookup -> {Unknown, Known}` and, when known,
//! `DuplicateCheck -> {AlreadyGranted, FirstGrant}`. Every path except a
//! malformed badge id appends exactly one ledger record. A failed append
//! does not change the decision returned to the caller; the response is
//! marked unaudited and the failure is logged.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use crate::directory::Directory;
use crate::guard::DuplicateGuard;
use crate::ledger::Ledger;
use crate::models::{AccessRecord, OutcomeKind, UNKNOWN_NAME};
use crate::time::{self, DayPolicy};
use crate::{Error, Result};

/// Longest accepted badge id
pub const MAX_BADGE_ID_LEN: usize = 64;

/// Decision returned for one verification request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub outcome: OutcomeKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// False when the ledger append failed
    pub audited: bool,
}

pub struct VerificationService<L> {
    directory: Arc<Directory>,
    ledger: L,
    guard: DuplicateGuard,
    policy: DayPolicy,
    unaudited: AtomicU64,
}

impl<L: Ledger> VerificationService<L> {
    pub fn new(directory: Arc<Directory>, ledger: L, policy: DayPolicy) -> Self {
        Self {
            directory,
            ledger,
            guard: DuplicateGuard::new(policy),
            policy,
            unaudited: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Decisions left out of the ledger since startup
    pub fn unaudited_count(&self) -> u64 {
        self.unaudited.load(Ordering::Relaxed)
    }

    pub async fn verify(&self, raw_badge_id: &str) -> Result<Verification> {
        self.verify_at(raw_badge_id, time::now()).await
    }

    /// Verify as of `now`
    ///
    /// Errors: `InvalidInput` for a malformed badge id (nothing recorded);
    /// a storage error if the duplicate check cannot read the ledger. The
    /// latter counts as an unaudited event.
    pub async fn verify_at(&self, raw_badge_id: &str, now: DateTime<Utc>) -> Result<Verification> {
        let badge_id = validate_badge_id(raw_badge_id)?;
        let now = now.trunc_subsecs(3);

        let Some(employee) = self.directory.lookup(&badge_id) else {
            let audited = self
                .record(AccessRecord::new(
                    badge_id.as_str(),
                    UNKNOWN_NAME,
                    OutcomeKind::DeniedUnknownBadge,
                    now,
                ))
                .await;
            return Ok(Verification {
                outcome: OutcomeKind::DeniedUnknownBadge,
                message: "Access denied. Badge not recognized.".to_string(),
                name: None,
                timestamp: now,
                audited,
            });
        };

        let name = employee.name.clone();

        let already_granted = match self.guard.already_granted(&self.ledger, &badge_id, now).await {
            Ok(granted) => granted,
            Err(e) => {
                self.unaudited.fetch_add(1, Ordering::Relaxed);
                error!(
                    badge_id = %badge_id,
                    timestamp = %now,
                    "Unrecorded denial, duplicate check could not read the ledger: {}",
                    e
                );
                return Err(e);
            }
        };

        if already_granted {
            let audited = self
                .record(AccessRecord::new(
                    badge_id.as_str(),
                    name.as_str(),
                    OutcomeKind::DeniedDuplicate,
                    now,
                ))
                .await;
            return Ok(Verification {
                outcome: OutcomeKind::DeniedDuplicate,
                message: format!("{}, you have already checked in today. Welcome back!", name),
                name: Some(name),
                timestamp: now,
                audited,
            });
        }

        let audited = self
            .record(AccessRecord::new(
                badge_id.as_str(),
                name.as_str(),
                OutcomeKind::Granted,
                now,
            ))
            .await;
        let local_time = now.with_timezone(&self.policy.offset()).format("%H:%M");
        Ok(Verification {
            outcome: OutcomeKind::Granted,
            message: format!("Access granted at {}. Welcome, {}!", local_time, name),
            name: Some(name),
            timestamp: now,
            audited,
        })
    }

    async fn record(&self, record: AccessRecord) -> bool {
        match self.ledger.append(&record).await {
            Ok(()) => {
                debug!(badge_id = %record.badge_id, outcome = %record.outcome, "Access recorded");
                true
            }
            Err(e) => {
                self.unaudited.fetch_add(1, Ordering::Relaxed);
                error!(
                    badge_id = %record.badge_id,
                    outcome = %record.outcome,
                    timestamp = %record.timestamp,
                    "Unaudited access decision, ledger append failed: {}",
                    e
                );
                false
            }
        }
    }
}

/// Trim and check a presented badge id
pub fn validate_badge_id(raw: &str) -> Result<String> {
    let badge_id = raw.trim();
    if badge_id.is_empty() {
        return Err(Error::InvalidInput("Badge id is required".to_string()));
    }
    if badge_id.chars().count() > MAX_BADGE_ID_LEN {
        return Err(Error::InvalidInput(format!(
            "Badge id longer than {} characters",
            MAX_BADGE_ID_LEN
        )));
    }
    if !badge_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::InvalidInput(
            "Badge id may only contain letters, digits, '-', '_' or '.'".to_string(),
        ));
    }
    Ok(badge_id.to_string())
}
