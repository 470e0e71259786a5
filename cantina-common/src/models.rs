//! Domain models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Name recorded for badges the directory does not know
pub const UNKNOWN_NAME: &str = "Unknown";

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub badge_id: String,
    pub name: String,
}

/// Result of one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Granted,
    DeniedUnknownBadge,
    DeniedDuplicate,
}

impl OutcomeKind {
    /// Stable storage/export representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Granted => "granted",
            OutcomeKind::DeniedUnknownBadge => "denied_unknown_badge",
            OutcomeKind::DeniedDuplicate => "denied_duplicate",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, OutcomeKind::Granted)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_granted()
    }

    /// Boundary response code ("ok", "unauthorized", "forbidden")
    pub fn code(&self) -> &'static str {
        match self {
            OutcomeKind::Granted => "ok",
            OutcomeKind::DeniedUnknownBadge => "unauthorized",
            OutcomeKind::DeniedDuplicate => "forbidden",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "granted" => Ok(OutcomeKind::Granted),
            "denied_unknown_badge" => Ok(OutcomeKind::DeniedUnknownBadge),
            "denied_duplicate" => Ok(OutcomeKind::DeniedDuplicate),
            other => Err(Error::InvalidInput(format!("Unknown outcome: {}", other))),
        }
    }
}

/// One row of the access ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub badge_id: String,
    pub resolved_name: String,
    pub outcome: OutcomeKind,
    pub timestamp: DateTime<Utc>,
}

impl AccessRecord {
    pub fn new(
        badge_id: impl Into<String>,
        resolved_name: impl Into<String>,
        outcome: OutcomeKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            badge_id: badge_id.into(),
            resolved_name: resolved_name.into(),
            outcome,
            timestamp,
        }
    }
}

/// Per-day aggregate produced by the report aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_requests: u64,
    pub granted_count: u64,
    /// Badges with at least one denial in the window, sorted
    pub denied_badge_ids: BTreeSet<String>,
}
