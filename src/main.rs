//! Main entry point for the wireslack CLI.
//!
//! Loads layered settings, applies CLI overrides and dispatches the command.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use wireslack::cli::commands::lookup::LookupQuery;
use wireslack::cli::{Cli, Commands, commands};
use wireslack::{Settings, logging};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Some(Commands::Init { force }) = &cli.command {
        return Ok(commands::init::run_init(*force)?);
    }

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.run.apply_to(&mut settings);
    if let Some(Commands::Run(args)) = &cli.command {
        args.apply_to(&mut settings);
    }

    logging::init_with_config(&settings.effective_logging());

    let code = match cli.command {
        Some(Commands::Config) => commands::init::run_config(&settings),
        Some(Commands::Parse { target }) => commands::parse::run(&target, &settings).await?,
        Some(Commands::Lookup {
            id,
            dtmf,
            name,
            room,
        }) => {
            let query = LookupQuery { id, dtmf, name, room };
            commands::lookup::run(&query, &settings).await?
        }
        Some(Commands::Run(_)) | None => {
            settings.validate().context("Invalid configuration")?;
            commands::run::run(settings).await?
        }
        Some(Commands::Init { .. }) => ExitCode::SUCCESS,
    };
    Ok(code)
}
