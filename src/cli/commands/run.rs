//! Run command - the relay loop.

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::{Relay, shutdown_signal};

pub async fn run(settings: Settings) -> Result<ExitCode> {
    let relay = Relay::new(settings)?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let summary = relay.run(shutdown).await;
    if summary.pollers == 0 {
        eprintln!("No target could be polled");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
