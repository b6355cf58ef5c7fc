//! iotapps - command line host for the IoT Apps SDK.
//!
//! Logs in to the cloud, keeps the session between invocations and reads
//! location narratives.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use iotapps_core::{AppApi, Config};

use commands::Command;

const USAGE: &str = "\
Usage: iotapps <command>

Commands:
  login [username]        Log in with a password
  passcode <username>     Log in with a one-time SMS passcode
  login-key <api-key>     Log in with an existing or temporary API key
  status                  Show the current session
  refresh                 Refresh the API key now
  logout [--all]          Log out here, or from every client with --all
  narratives <locationId> List recent narratives of a location

Environment:
  RUST_LOG                Log filter (default: warn)
  IOTAPPS_LOG_FILE=1      Also write a daily log file to the cache directory
  IOTAPPS_SERVER_URL      Override the cloud server
  IOTAPPS_BRAND           Override the brand
";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard, which must live until exit so buffered
/// lines are flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file = std::env::var("IOTAPPS_LOG_FILE")
        .ok()
        .filter(|v| v == "1")
        .and_then(|_| config.cache_dir().ok())
        .map(|dir| {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "iotapps.log");
            tracing_appender::non_blocking(appender)
        });

    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
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

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = Config::load()?;
    let _log_guard = init_tracing(&config);
    info!(server_url = %config.server_url, "iotapps starting");

    let app = AppApi::from_config(&config)?;
    commands::run(&app, config, command).await
}
