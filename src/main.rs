//! rxstorage CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`; prints fatal errors
//! to stderr and exits non-zero.

use rxstorage::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}: {}", e.code(), e);
        std::process::exit(1);
    }
}
