//! # Cantina Common Library
//!
//! Meal-access verification engine shared by the cantina service:
//! - Badge directory (read-once badge id to name mapping)
//! - Append-only access ledger and the duplicate-access guard
//! - Verification, daily reporting and reset
//! - Calendar-day policy, configuration loading, database initialization

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod report;
pub mod reset;
pub mod time;
pub mod verify;

pub use directory::{Directory, DirectoryStatus};
pub use error::{Error, Result};
pub use ledger::{Ledger, SqliteLedger};
pub use models::{AccessRecord, DailySummary, Employee, OutcomeKind};
pub use report::{ExportFormat, ReportAggregator};
pub use reset::{ResetController, ResetOutcome};
pub use time::{DailyWindow, DayPolicy};
pub use verify::{Verification, VerificationService};
