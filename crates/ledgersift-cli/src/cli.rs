//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LedgerSift - Transaction intelligence for personal-finance data
#[derive(Parser)]
#[command(name = "ledgersift")]
#[command(about = "Detect anomalies, subscriptions and duplicates in transaction history", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run anomaly detection over the most recent 30 days of a snapshot
    Analyze {
        /// Transaction CSV snapshot
        #[arg(short, long)]
        file: PathBuf,

        /// Months of trailing history to baseline against
        #[arg(long, default_value = "3")]
        history_months: u32,
    },

    /// Infer recurring payments from the full snapshot
    Subscriptions {
        /// Transaction CSV snapshot
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List groups of likely duplicate transactions
    Duplicates {
        /// Transaction CSV snapshot
        #[arg(short, long)]
        file: PathBuf,

        /// Grouping window in minutes
        #[arg(long, default_value = "5")]
        window_minutes: i64,
    },

    /// Score transactions against a category file
    Categorize {
        /// Transaction CSV snapshot
        #[arg(short, long)]
        file: PathBuf,

        /// JSON file with categories (and optional rules)
        #[arg(short, long)]
        categories: PathBuf,
    },
}
