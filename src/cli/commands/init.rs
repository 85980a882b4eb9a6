//! Init and Config commands.

use std::process::ExitCode;

use crate::config::Settings;
use crate::error::Result;

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> Result<ExitCode> {
    let path = Settings::init_config_file(force)?;
    println!("Created configuration file at: {}", path.display());
    println!("Set sink.webhook and targets, then run wireslack.");
    Ok(ExitCode::SUCCESS)
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> ExitCode {
    match config.to_toml() {
        Ok(toml_str) => {
            println!("{toml_str}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error displaying config: {e}");
            ExitCode::FAILURE
        }
    }
}
