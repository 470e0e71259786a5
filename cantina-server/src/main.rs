//! cantina-server - Meal access verification service
//!
//! Startup sequence: tracing, build identification, configuration,
//! database, badge directory, daily reset timer, HTTP server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cantina_common::config::{resolve_root_folder, Config};
use cantina_common::db::init::init_database;
use cantina_common::{Directory, SqliteLedger};
use cantina_server::{build_router, scheduler, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cantina-server
#[derive(Parser, Debug)]
#[command(name = "cantina-server")]
#[command(about = "Meal access verification and daily reporting service")]
#[command(version)]
struct Args {
    /// Root folder holding cantina.toml, the database and the badge list
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Badge list file (overrides config; relative paths resolve under the root folder)
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cantina_server=info,cantina_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting cantina-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let mut config = Config::load(&root_folder).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.set_port(port);
    }
    if let Some(directory) = args.directory {
        config.directory_file = directory;
    }
    if config.admin_secret.is_none() {
        warn!("No admin secret configured; manual reset is disabled");
    }

    let db_path = config.database_path();
    let pool = init_database(&db_path, config.storage_timeout())
        .await
        .with_context(|| format!("Failed to open ledger database {}", db_path.display()))?;
    let ledger = SqliteLedger::new(pool, config.storage_timeout());

    let directory = Arc::new(Directory::load(&config.directory_path()));

    let state = AppState::new(&config, directory, ledger).context("Invalid configuration")?;

    let reset_at = config.reset_at().context("Invalid reset_time")?;
    scheduler::spawn_daily_reset(state.reset.clone(), state.policy, reset_at);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("cantina-server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM; in-flight verifications finish first
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let source = tokio::select! {
        _ = interrupt => "Ctrl+C",
        _ = sigterm => "SIGTERM",
    };
    info!("{} received, stopping cantina-server", source);
}
