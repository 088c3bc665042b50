//! BerrySend CLI - a command-line front end for the BerrySend client.
//!
//! Drives the session lifecycle of the route-management client: sign in,
//! sign up, sign out, refresh the token, inspect the session, and navigate
//! the auth-gated routes.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use berrysend_core::config::EnvironmentConfig;
use berrysend_core::{ClientContext, StorageBackend};

use commands::Command;

/// Log file name prefix when file logging is enabled
const LOG_FILE_PREFIX: &str = "berrysend.log";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("BERRYSEND_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let backend = match std::env::var("BERRYSEND_STORAGE") {
        Ok(raw) if !raw.is_empty() => raw.parse()?,
        _ => StorageBackend::default(),
    };

    let config = EnvironmentConfig::from_env();
    let ctx = ClientContext::build(config, backend)?;
    info!(?command, "BerrySend CLI starting");

    if let Err(e) = commands::run(&ctx, command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
