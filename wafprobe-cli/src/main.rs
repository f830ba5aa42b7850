//! wafprobe CLI entry point

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use wafprobe_core::config::{GeneralConfig, WafprobeConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli).await {
        eprintln!("wafprobe: {:#}", e);
        return ExitCode::from(1);
    }

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            use colored::Colorize;
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// `[general]` from the config file when it loads, defaults otherwise.
async fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let general = WafprobeConfig::load(&cli.config)
        .await
        .map(|c| c.general)
        .unwrap_or_else(|_| GeneralConfig::default());
    logging::init_tracing(&general, cli.log_level.as_deref())
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    tracing::debug!(config = %cli.config.display(), "wafprobe starting");

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.config, &writer).await,
        Commands::List => commands::list::execute(&cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::CheckId(args) => commands::check_id::execute(args, &writer),
    }
}

fn exit_status(e: &CliError) -> u8 {
    u8::try_from(e.exit_code()).unwrap_or(1)
}
