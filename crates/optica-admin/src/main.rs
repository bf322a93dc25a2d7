//! optica-admin: maintenance scripts run against an existing database.
//!
//! Diagnostic logs go to stderr; batch progress and each script's report go to stdout.

use std::io;
use std::process;

use tracing::error;
use tracing_subscriber::EnvFilter;

use optica_admin::cli::Cli;
use optica_admin::commands;

fn main() {
    let cli = Cli::load().unwrap_or_else(|e| {
        // Logging is not set up yet
        let _ = e.print();
        process::exit(if e.use_stderr() { 1 } else { 0 });
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    if let Err(e) = commands::run(cli, &mut stdout.lock()) {
        error!("{:#}", e);
        process::exit(1);
    }
}
