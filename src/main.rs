mod accumulator;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod reports;
mod resolver;
mod settings;
mod snapshot;

use clap::Parser;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Load { path } => cli::load::run(&path),
        Commands::Import { file, year } => cli::import::run(&file, year),
        Commands::Resolve { as_of } => cli::resolve::run(as_of.as_deref()),
        Commands::Report { command } => match command {
            ReportCommands::Aging => cli::report::aging(),
            ReportCommands::Months { account } => cli::report::months(&account),
            ReportCommands::Runs { limit } => cli::report::runs(limit),
        },
        Commands::Export { format, output } => cli::export::run(format, output),
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
