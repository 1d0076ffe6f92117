//! LedgerSift CLI - Transaction intelligence over CSV snapshots
//!
//! Usage:
//!   ledgersift analyze --file tx.csv        Run anomaly detection
//!   ledgersift subscriptions --file tx.csv  Infer recurring payments
//!   ledgersift duplicates --file tx.csv     List duplicate groups
//!   ledgersift categorize --file tx.csv --categories cats.json

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            history_months,
        } => commands::cmd_analyze(&file, history_months, cli.json),
        Commands::Subscriptions { file } => commands::cmd_subscriptions(&file, cli.json),
        Commands::Duplicates {
            file,
            window_minutes,
        } => commands::cmd_duplicates(&file, window_minutes, cli.json),
        Commands::Categorize { file, categories } => {
            commands::cmd_categorize(&file, &categories, cli.json)
        }
    }
}
