//! `codewarden` -- command-line entry point.
//!
//! Parses arguments, loads the configuration, initialises logging and
//! dispatches to a subcommand. Errors are printed to stderr and mapped to
//! the exit codes documented on [`error::CliError::exit_code`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let writer = OutputWriter::new(cli.output);

    let exit_code = match run(cli, &writer).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    let loaded = commands::load_config(cli.config.as_deref()).await;

    // `config validate` reports a broken file itself, so logging falls back to defaults.
    let mut general = loaded
        .as_ref()
        .map(|l| l.config.general.clone())
        .unwrap_or_default();
    if let Some(level) = cli.log_level {
        general.log_level = level;
    }
    logging::init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
    codewarden_core::metrics::describe_all();

    match cli.command {
        Commands::Config(args) => {
            commands::config::execute(args, cli.config.as_deref(), writer).await
        }
        Commands::Scan(args) => commands::scan::execute(args, &loaded?.config, writer).await,
        Commands::Tools => commands::tools::execute(&loaded?.config, writer).await,
    }
}
