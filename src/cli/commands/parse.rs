//! Parse command - fetch one log page and print the snapshot as JSON.

use std::process::ExitCode;

use crate::config::Settings;
use crate::error::Result;
use crate::fetch::Source;
use crate::poller::Poller;

pub async fn run(target: &str, settings: &Settings) -> Result<ExitCode> {
    let source = Source::open(target, settings.fetch_timeout())?;
    let poller = Poller::new(source, settings.timezone()?, settings.poll_interval());
    let snapshot = poller.poll_once().await?;

    let json = serde_json::to_string_pretty(&snapshot)?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}
