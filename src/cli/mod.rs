pub mod backup;
pub mod export;
pub mod import;
pub mod init;
pub mod load;
pub mod report;
pub mod resolve;
pub mod status;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "ledger-aging",
    version,
    about = "Supplier-ledger aging and reconciliation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for data (default: ~/Documents/ledger-aging)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Switch to an existing data directory.
    Load {
        /// Path to data directory containing aging.db
        path: String,
    },
    /// Import an ERP ledger export (CSV). Replaces current-year entries.
    Import {
        /// Path to the CSV export
        file: String,
        /// Processing year (default: settings or current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Recompute aging records from the stored ledger and swap them in.
    Resolve {
        /// Processing reference date: YYYY-MM-DD (default: today)
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
    /// Show reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export the current aging records.
    Export {
        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Output path (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/aging-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Aging buckets per account from the last resolve.
    Aging,
    /// Monthly debit/credit buckets for one account.
    Months {
        /// Account id
        account: String,
    },
    /// Recent resolve runs and their failed accounts.
    Runs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}
