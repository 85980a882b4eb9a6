//! Per-target polling loop.

use std::time::Duration;

use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::fetch::Source;
use crate::parser;
use crate::types::Snapshot;

/// Why a poller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    Cancelled,
    /// The processor is gone; nothing would consume further snapshots.
    QueueClosed,
}

/// Fetches one target on a fixed interval and queues parsed snapshots.
///
/// Fetch and format failures are logged and retried on the next tick.
#[derive(Debug)]
pub struct Poller {
    source: Source,
    tz: Tz,
    interval: Duration,
}

impl Poller {
    pub fn new(source: Source, tz: Tz, interval: Duration) -> Self {
        Self {
            source,
            tz,
            interval,
        }
    }

    /// Fetch and parse the target once.
    pub async fn poll_once(&self) -> crate::error::Result<Snapshot> {
        let document = self.source.fetch().await?;
        crate::debug_event!(
            "poller",
            "read",
            "{} bytes from {}",
            document.len(),
            self.source.url()
        );
        Ok(parser::parse(&document, self.tz, self.source.url())?)
    }

    /// Poll until `shutdown` fires or the snapshot queue closes.
    pub async fn run(self, snapshots: mpsc::Sender<Snapshot>, shutdown: CancellationToken) -> PollerExit {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        crate::debug_event!("poller", "started", "{} every {:?}", self.source.url(), self.interval);

        let exit = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break PollerExit::Cancelled,
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                _ = shutdown.cancelled() => break PollerExit::Cancelled,
                result = self.poll_once() => match result {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        warn!("[poller] {}: {e}", self.source.url());
                        continue;
                    }
                },
            };

            tokio::select! {
                _ = shutdown.cancelled() => break PollerExit::Cancelled,
                sent = snapshots.send(snapshot) => {
                    if sent.is_err() {
                        break PollerExit::QueueClosed;
                    }
                }
            }
        };

        crate::debug_event!("poller", "stopped", "{} ({exit:?})", self.source.url());
        exit
    }
}
