//! Homestead - browse and manage property listings from the terminal.
//!
//! Anyone can search and view listings; signed-in users can create, edit and
//! delete their own listings and attach photos uploaded straight to the
//! media host.

mod cli;
mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use homestead_core::{ApiClient, AuthEvent, Config, CredentialStore, Session};

use cli::Cli;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "homestead.log";

/// Initialize the tracing subscriber for logging.
/// Returns the guard that flushes the file writer, when logging to a file.
fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(ref url) = cli.api_url {
        config.api_base_url = url.clone();
    }

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir.clone());
    let _log_guard = init_tracing(log_dir.as_deref());
    info!(api = %config.api_base_url, "Homestead starting");

    let store = Arc::new(CredentialStore::new(config.token_storage()?));
    let snapshot = store.initialize();
    debug!(authenticated = snapshot.is_authenticated(), "Session initialized");

    let api = ApiClient::new(config.gateway_config()?, store.clone(), config.timeout())
        .context("Failed to create API client")?;
    let session = Session::new(api);

    let mut events = session.events();
    let result = commands::run(cli.command, &session, &mut config).await;

    // A refresh failure during the command ends the session; point the user
    // back at the login entry point.
    let mut expired = false;
    while let Ok(event) = events.try_recv() {
        expired |= event == AuthEvent::SessionExpired;
    }
    if expired {
        eprintln!("Your session has expired. Run `homestead login` to sign in again.");
    }

    result
}
