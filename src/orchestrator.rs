//! Wiring of pollers, directory refresher and processor.
//!
//! ```text
//! poller (per target) ──┐
//! poller (per target) ──┼─ mpsc ─> processor ─> sink
//! poller (per target) ──┘             │
//!                                     └─ lookups ─> directory cache <─ refresher
//! ```
//!
//! Every loop is bound to a cancellation token. When the caller's token
//! fires, the pollers stop, the processor drains what is already queued and
//! [`Relay::run`] returns.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::directory::{DirectoryCache, DirectoryRefresher, DirectorySources};
use crate::error::Result;
use crate::fetch::Source;
use crate::poller::{Poller, PollerExit};
use crate::processor::Processor;
use crate::sink::{NotificationSink, SlackWebhook};

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pollers: usize,
    /// Targets skipped because they could not be opened.
    pub rejected_targets: usize,
    pub snapshots: u64,
}

/// The assembled relay, ready to run.
pub struct Relay {
    settings: Settings,
    tz: Tz,
    sink: Arc<dyn NotificationSink>,
    directory: Option<Arc<DirectoryCache>>,
}

/// Build the directory cache described by `settings`, if enabled.
pub fn directory_cache(settings: &Settings) -> Result<Option<Arc<DirectoryCache>>> {
    let config = &settings.directory;
    if !config.enabled {
        return Ok(None);
    }
    let timeout = Duration::from_secs(config.timeout_secs);
    let rooms = match config.rooms_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(Source::open(url, timeout)?),
        _ => None,
    };
    let sources = DirectorySources {
        nodes: Source::open(&config.nodes_url, timeout)?,
        rooms,
        convention: config.longitude_convention,
    };
    Ok(Some(Arc::new(DirectoryCache::new(sources))))
}

impl Relay {
    /// Assemble the relay with the Slack webhook from `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        let sink = SlackWebhook::new(
            settings.sink.webhook.clone(),
            settings.sink.dry,
            Duration::from_secs(settings.sink.timeout_secs),
        )?;
        Self::with_sink(settings, Arc::new(sink))
    }

    /// Assemble the relay around an arbitrary sink.
    pub fn with_sink(settings: Settings, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let tz = settings.timezone()?;
        let directory = directory_cache(&settings)?;
        Ok(Self {
            settings,
            tz,
            sink,
            directory,
        })
    }

    pub fn directory(&self) -> Option<Arc<DirectoryCache>> {
        self.directory.clone()
    }

    /// Run until `shutdown` fires or every poller has stopped.
    pub async fn run(self, shutdown: CancellationToken) -> RunSummary {
        let settings = &self.settings;
        // Child token so the background loops also stop once all pollers are gone.
        let internal = shutdown.child_token();

        let refresher = self.directory.clone().map(|cache| {
            let interval = Duration::from_secs(settings.directory.refresh_interval_secs);
            tokio::spawn(DirectoryRefresher::new(cache, interval).run(internal.clone()))
        });

        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        let mut processor = Processor::new(self.sink.clone(), settings.processor_options());
        if let Some(directory) = &self.directory {
            processor = processor.with_directory(directory.clone());
        }
        let processor = tokio::spawn(processor.run(rx, internal.clone()));

        let mut summary = RunSummary::default();
        let mut pollers = JoinSet::new();
        for target in settings.targets() {
            let source = match Source::open(target, settings.fetch_timeout()) {
                Ok(source) => source,
                Err(e) => {
                    error!("[relay] not polling {target}: {e}");
                    summary.rejected_targets += 1;
                    continue;
                }
            };
            let poller = Poller::new(source, self.tz, settings.poll_interval());
            pollers.spawn(poller.run(tx.clone(), shutdown.clone()));
            summary.pollers += 1;
        }
        drop(tx);
        crate::debug_event!(
            "relay",
            "started",
            "{} pollers, directory {}",
            summary.pollers,
            if self.directory.is_some() { "enabled" } else { "disabled" }
        );

        while let Some(result) = pollers.join_next().await {
            match result {
                Ok(PollerExit::Cancelled) => {}
                Ok(PollerExit::QueueClosed) => warn!("[relay] poller stopped, processor is gone"),
                Err(e) => error!("[relay] poller task failed: {e}"),
            }
        }

        internal.cancel();
        match processor.await {
            Ok(processed) => summary.snapshots = processed,
            Err(e) => error!("[relay] processor task failed: {e}"),
        }
        if let Some(refresher) = refresher {
            if let Err(e) = refresher.await {
                error!("[relay] directory refresher task failed: {e}");
            }
        }

        crate::debug_event!("relay", "stopped", "{} logs processed", summary.snapshots);
        summary
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
