//! HTTP API handlers for cantina-server

pub mod error;
pub mod health;
pub mod report;
pub mod reset;
pub mod verify;

pub use error::ApiError;
pub use health::health_routes;
pub use report::{daily_text_report, get_report};
pub use reset::{reset_ledger, reset_ledger_query};
pub use verify::verify_badge;
