//! Snapshot processing: dedup, noise filtering, enrichment and dispatch.
//!
//! A single [`Processor`] consumes snapshots from every poller through one
//! queue and finishes each snapshot before taking the next, so the
//! watermarks need no locking.

mod enrich;
mod watermark;

pub use enrich::{Enrichment, enrich};
pub use watermark::{WatermarkScope, Watermarks};

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::directory::DirectoryCache;
use crate::sink::{Attachment, COLOR_GOOD, Message, NotificationSink};
use crate::types::{Event, Snapshot};

/// Date/time format presented in notifications.
pub const POST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Messages containing any of these are dropped.
pub const DEFAULT_NOISE_FILTERS: &[&str] = &["Browser connected from"];

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub noise_filters: Vec<String>,
    pub scope: WatermarkScope,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            noise_filters: DEFAULT_NOISE_FILTERS.iter().map(|s| s.to_string()).collect(),
            scope: WatermarkScope::default(),
        }
    }
}

/// Counts for one processed snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub seen: usize,
    /// At or before the watermark.
    pub too_old: usize,
    pub noise: usize,
    pub delivered: usize,
    /// Dispatch failed; still counts as delivered for the watermark.
    pub failed: usize,
}

impl ProcessReport {
    pub fn filtered(&self) -> usize {
        self.too_old + self.noise
    }
}

pub struct Processor {
    directory: Option<Arc<DirectoryCache>>,
    sink: Arc<dyn NotificationSink>,
    noise_filters: Vec<String>,
    watermarks: Watermarks,
    processed: u64,
}

impl Processor {
    /// Create a processor whose watermarks start now.
    pub fn new(sink: Arc<dyn NotificationSink>, options: ProcessorOptions) -> Self {
        Self {
            directory: None,
            sink,
            noise_filters: options.noise_filters,
            watermarks: Watermarks::new(options.scope, Utc::now().fixed_offset()),
            processed: 0,
        }
    }

    /// Enrich notifications from `directory`.
    pub fn with_directory(mut self, directory: Arc<DirectoryCache>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Start the watermarks at `start` instead of now.
    pub fn starting_at(mut self, start: DateTime<FixedOffset>) -> Self {
        self.watermarks = Watermarks::new(self.watermarks.scope(), start);
        self
    }

    /// Current watermark for events from `source`.
    pub fn watermark(&self, source: &str) -> DateTime<FixedOffset> {
        self.watermarks.get(source)
    }

    /// Number of snapshots processed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Deliver every new event of `snapshot` and advance the watermark.
    ///
    /// Never fails: dispatch errors are logged and the event still counts
    /// as delivered.
    pub async fn process(&mut self, mut snapshot: Snapshot) -> ProcessReport {
        self.processed += 1;
        let not_before = self.watermarks.get(&snapshot.source);
        let mut report = ProcessReport::default();
        let mut last_delivered: Option<DateTime<FixedOffset>> = None;

        snapshot.events.sort_by_key(|e| e.ts);
        for event in &snapshot.events {
            report.seen += 1;
            if event.ts <= not_before {
                report.too_old += 1;
                continue;
            }
            if self.is_noise(&event.msg) {
                report.noise += 1;
                continue;
            }
            last_delivered = last_delivered.max(Some(event.ts));

            crate::log_event!(
                "processor",
                "new message",
                "from {} ({}): {}",
                snapshot.id,
                snapshot.log_type,
                event.msg
            );
            let mut message = format_message(&snapshot, event);
            let enrichment = self
                .directory
                .as_deref()
                .and_then(|directory| enrich(&event.msg, directory));
            if let Some(enrichment) = enrichment {
                apply_enrichment(&mut message, enrichment);
            }

            match self.sink.send(&message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("[processor] failed to post message from {}: {e}", snapshot.id);
                }
            }
        }

        if let Some(ts) = last_delivered {
            self.watermarks.advance(&snapshot.source, ts);
        }
        crate::debug_event!(
            "processor",
            "processed",
            "log #{} from {}: {} events, filtered {} ({} old, {} noise)",
            self.processed,
            snapshot.source,
            report.seen,
            report.filtered(),
            report.too_old,
            report.noise
        );
        report
    }

    /// Process snapshots until the queue closes or `shutdown` fires.
    ///
    /// On shutdown, snapshots already queued are still processed.
    pub async fn run(mut self, mut snapshots: mpsc::Receiver<Snapshot>, shutdown: CancellationToken) -> u64 {
        loop {
            tokio::select! {
                biased;
                snapshot = snapshots.recv() => match snapshot {
                    Some(snapshot) => {
                        self.process(snapshot).await;
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    snapshots.close();
                    while let Some(snapshot) = snapshots.recv().await {
                        self.process(snapshot).await;
                    }
                    break;
                }
            }
        }
        crate::debug_event!("processor", "stopped", "{} logs processed", self.processed);
        self.processed
    }

    fn is_noise(&self, msg: &str) -> bool {
        self.noise_filters.iter().any(|f| msg.contains(f.as_str()))
    }
}

/// Build the notification for one event of a log.
pub fn format_message(snapshot: &Snapshot, event: &Event) -> Message {
    let line = format!("{}: {}", snapshot.id, event.msg);
    Message {
        text: line.clone(),
        attachments: vec![Attachment {
            pretext: Some(line),
            footer: Some(format!(
                "{} | {}",
                snapshot.log_type,
                event.ts.format(POST_TIME_FORMAT)
            )),
            ts: event.ts.timestamp(),
            ..Attachment::default()
        }],
    }
}

fn apply_enrichment(message: &mut Message, enrichment: Enrichment) {
    if let Some(attachment) = message.attachments.first_mut() {
        attachment.title = Some(enrichment.title);
        attachment.text = Some(enrichment.text);
        attachment.color = Some(COLOR_GOOD.to_string());
    }
}
