pub mod export;
pub mod init;
pub mod invoices;
pub mod prefixes;
pub mod seed;
pub mod serve;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{InvoicerError, Result};
use crate::settings::Settings;

/// Open the configured database, refusing to create one implicitly.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(InvoicerError::Settings(format!(
            "No database found at {}\nRun `invoicer init` first.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

#[derive(Parser)]
#[command(name = "invoicer", version, about = "GST invoicing for a small Indian business.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, the database and the current FY prefix.
    Init {
        /// Path for invoicer data (default: ~/Documents/invoicer)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Replace all data with generated customers, items and invoices.
    Seed {
        #[arg(long, default_value_t = 200)]
        customers: usize,
        #[arg(long, default_value_t = 80)]
        items: usize,
        /// Months of invoice history ending with the current month
        #[arg(long, default_value_t = 18)]
        months: u32,
        /// Average invoices per month
        #[arg(long = "per-month", default_value_t = 120)]
        per_month: u32,
        /// Seed for a reproducible data set
        #[arg(long = "rng-seed")]
        rng_seed: Option<u64>,
    },
    /// Run the HTTP API.
    Serve {
        /// Address to listen on (default from settings: 127.0.0.1:5000)
        #[arg(long)]
        bind: Option<String>,
    },
    /// List invoices and preview numbering.
    Invoices {
        #[command(subcommand)]
        command: InvoicesCommands,
    },
    /// Manage invoice number prefixes.
    Prefixes {
        #[command(subcommand)]
        command: PrefixesCommands,
    },
    /// Export invoices to PDF or the sales register to CSV.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Print the financial year a date falls in (default: today).
    Fy {
        /// Date: YYYY-MM-DD
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum InvoicesCommands {
    /// List invoices, newest first.
    List {
        /// Match invoice number, customer name or total
        #[arg(long)]
        search: Option<String>,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Show the number the next invoice under a prefix would get.
    NextNumber {
        #[arg(long)]
        prefix: String,
    },
}

#[derive(Subcommand)]
pub enum PrefixesCommands {
    /// List registered prefixes.
    List,
    /// Register a prefix, e.g. 'FY25-26/'.
    Add {
        prefix: String,
        /// Make it the default prefix
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Render one invoice as a PDF.
    #[cfg(feature = "pdf")]
    Pdf {
        /// Invoice id
        id: i64,
        /// default, modern, minimalist, classic, creative or technical
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Write the sales register as CSV.
    Register {
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        output: Option<String>,
    },
}
