//! Daily reset timer
//!
//! Sleeps until the configured local wall-clock time (in the reference
//! timezone), runs the scheduled reset, and repeats. Failures are logged and
//! the timer keeps running. The reset may overlap in-flight verifications.

use cantina_common::{time, DayPolicy, Ledger, ResetController};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Time to wait from `now` until the next reset
pub fn delay_until_next(policy: &DayPolicy, at: NaiveTime, now: DateTime<Utc>) -> Duration {
    (policy.next_occurrence(now, at) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Spawn the recurring reset task
pub fn spawn_daily_reset<L>(
    reset: Arc<ResetController<L>>,
    policy: DayPolicy,
    at: NaiveTime,
) -> JoinHandle<()>
where
    L: Ledger + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = time::now();
            let wait = delay_until_next(&policy, at, now);
            info!(
                "Next scheduled reset at {} (in {}s)",
                policy.next_occurrence(now, at),
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;

            if let Err(e) = reset.scheduled_reset().await {
                error!("Scheduled reset failed: {}", e);
            }
        }
    })
}
