mod catalog;
mod cli;
mod customers;
mod db;
mod error;
mod fiscal;
mod fmt;
mod invoices;
mod items;
mod logging;
mod models;
#[cfg(feature = "pdf")]
mod pdf;
mod reports;
mod sequence;
mod server;
mod settings;
mod tax;

use chrono::Local;
use clap::Parser;

use cli::{Cli, Commands, ExportCommands, InvoicesCommands, PrefixesCommands};

fn main() {
    let cli = Cli::parse();
    let settings = settings::load_settings();
    logging::init_tracing("info", settings.log_json);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Seed {
            customers,
            items,
            months,
            per_month,
            rng_seed,
        } => cli::seed::run(cli::seed::SeedOptions {
            customers,
            items,
            months,
            per_month,
            rng_seed,
        }),
        Commands::Serve { bind } => cli::serve::run(bind),
        Commands::Invoices { command } => match command {
            InvoicesCommands::List {
                search,
                from,
                to,
                limit,
            } => cli::invoices::list(search, from, to, limit),
            InvoicesCommands::NextNumber { prefix } => cli::invoices::next_number(&prefix),
        },
        Commands::Prefixes { command } => match command {
            PrefixesCommands::List => cli::prefixes::list(),
            PrefixesCommands::Add { prefix, default } => cli::prefixes::add(&prefix, default),
        },
        Commands::Export { command } => match command {
            #[cfg(feature = "pdf")]
            ExportCommands::Pdf { id, theme, output } => cli::export::pdf(id, theme, output),
            ExportCommands::Register { from, to, output } => cli::export::register(from, to, output),
        },
        Commands::Fy { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            println!("{}", fiscal::fiscal_year_of(date));
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
