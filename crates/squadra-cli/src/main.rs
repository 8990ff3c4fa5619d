//! Squadra - command-line client for club and team management.
//!
//! Reads go to the backend first and fall back to the local cache when the
//! backend is unreachable, so listings keep working offline.

mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use squadra_core::{CacheCoordinator, CacheStore, Config, FileOpener, Session};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;

/// Shown when the local store cannot be initialized. The command still runs,
/// online only.
const INIT_FAILURE_ALERT: &str =
    "Initialization Error: Failed to initialize the app. Please restart the application.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{}", usage);
            std::process::exit(2);
        }
    };

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env();

    let data_dir = config.data_dir().unwrap_or_else(|_| PathBuf::from("./data"));
    info!(?data_dir, "Data directory configured");

    // The coordinator is owned here and shared with everything that caches
    let coordinator = Arc::new(CacheCoordinator::new(FileOpener::new(
        &data_dir,
        &config.database_name,
    )));
    if let Err(e) = coordinator.initialize().await {
        error!(error = %e, "Local cache unavailable");
        eprintln!("{}\n  ({})", INIT_FAILURE_ALERT, e);
    }
    let cache = CacheStore::new(Arc::clone(&coordinator));

    let mut session = Session::new(data_dir, config.persist_session);
    if let Err(e) = session.load() {
        warn!(error = %e, "Failed to load saved session");
    }

    let mut ctx = commands::Context {
        config,
        session,
        cache,
    };

    if let Err(e) = commands::run(command, &mut ctx).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
