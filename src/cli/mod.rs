//! CLI module for rxstorage
//!
//! Opens one collection of a file storage, as named by a JSON config
//! file, and runs a single command against it.

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command, OrderArg};
pub use commands::{open_instance, run_command};
pub use config::StorageConfig;
pub use errors::{CliError, CliResult};
pub use io::{parse_lines, read_lines, read_request, write_error, write_response};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse arguments, open the configured collection and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    // Logs go to stderr; stdout carries responses
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = StorageConfig::load(&cli.config)?;
    let instance = open_instance(&config)?;
    let result = run_command(&instance, cli.command);
    instance.close();
    result
}
