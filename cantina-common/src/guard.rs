//! Duplicate-access guard
//!
//! Answers "has this badge already been granted today?" by querying the
//! ledger. The check and the caller's later append are not one transaction:
//! two requests for the same badge in the same instant can both see `false`
//! and both be granted. That race is accepted.

use chrono::{DateTime, Utc};

use crate::ledger::Ledger;
use crate::time::DayPolicy;
use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct DuplicateGuard {
    policy: DayPolicy,
}

impl DuplicateGuard {
    pub fn new(policy: DayPolicy) -> Self {
        Self { policy }
    }

    /// True iff the day window containing `as_of` already holds a Granted
    /// record for `badge_id`
    pub async fn already_granted<L: Ledger>(
        &self,
        ledger: &L,
        badge_id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<bool> {
        let window = self.policy.window_containing(as_of)?;
        let records = ledger.query_window(&window, Some(badge_id)).await?;
        Ok(records.iter().any(|r| r.outcome.is_granted()))
    }
}
