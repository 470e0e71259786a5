//! cantina-server library - HTTP surface of the meal-access engine
//!
//! Exposes verification, daily reports and ledger reset over HTTP and runs
//! the daily reset timer.

use axum::Router;
use cantina_common::config::Config;
use cantina_common::{
    DayPolicy, Directory, ReportAggregator, ResetController, SqliteLedger, VerificationService,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod scheduler;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<VerificationService<SqliteLedger>>,
    pub reports: Arc<ReportAggregator<SqliteLedger>>,
    pub reset: Arc<ResetController<SqliteLedger>>,
    /// Direct ledger handle for health probing
    pub ledger: SqliteLedger,
    pub policy: DayPolicy,
}

impl AppState {
    /// Wire the engine components over one ledger
    pub fn new(
        config: &Config,
        directory: Arc<Directory>,
        ledger: SqliteLedger,
    ) -> cantina_common::Result<Self> {
        let policy = config.day_policy()?;
        let archive_dir = config.archive_on_reset.then(|| config.archive_path());

        Ok(Self {
            verifier: Arc::new(VerificationService::new(directory, ledger.clone(), policy)),
            reports: Arc::new(ReportAggregator::new(ledger.clone(), policy)),
            reset: Arc::new(ResetController::new(
                ledger.clone(),
                policy,
                config.reset_policy,
                config.admin_secret.as_deref(),
                archive_dir,
            )),
            ledger,
            policy,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        // Verification (badge readers, front desk page)
        .route("/api/verify", post(api::verify_badge))
        .route("/verificar-acesso", post(api::verify_badge))
        // Reports
        .route("/api/report", get(api::get_report))
        .route("/relatorio-diario", get(api::daily_text_report))
        // Reset (admin secret in body or query)
        .route("/api/reset", post(api::reset_ledger))
        .route("/api/zerar-relatorio", get(api::reset_ledger_query))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
