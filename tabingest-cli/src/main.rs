//! Tabular source normalization tool.
//!
//! Reads delimited files, spreadsheets, JSON, plain text, SQL dumps and
//! live databases into one schema and row format, and synchronizes
//! registered sources into a directory of row files.
//!
//! # Security Guarantees
//! - Database connections are opened read-only
//! - Connection strings are redacted in logs and errors

use clap::Parser;
use tabingest_cli::{Cli, commands};
use tabingest_core::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    if let Err(e) = commands::run(&cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
