use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::DirectoryCache;

/// Periodically rebuilds the directory cache.
///
/// The first refresh runs immediately. A failed refresh keeps the previous
/// directory and is retried on the next tick.
pub struct DirectoryRefresher {
    cache: Arc<DirectoryCache>,
    interval: Duration,
}

impl DirectoryRefresher {
    pub fn new(cache: Arc<DirectoryCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Refresh until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A refresh in flight is abandoned on shutdown; it publishes nothing.
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.cache.refresh() => match result {
                    Ok(directory) => crate::debug_event!(
                        "directory",
                        "refreshed",
                        "{} nodes, {} rooms, updated {}",
                        directory.nodes.len(),
                        directory.rooms.len(),
                        directory.last_update
                    ),
                    Err(e) => warn!("[directory] refresh failed, keeping previous entries: {e}"),
                }
            }
        }
        crate::debug_event!("directory", "refresher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectorySources, LongitudeConvention};
    use crate::fetch::Source;
    use crate::test_support::ScriptedFetch;

    const NODES: &str = r#"dataList[0] = {id:"ALPHA-ND", dtmf_id:"111", call_sign:"AL1PHA", ana_dig:"DN", city:"Springfield", state:"IL", country:"US", freq:"", sql:"", lat:"", lon:"", comment:""};"#;

    fn cache(fetch: Arc<ScriptedFetch>) -> Arc<DirectoryCache> {
        Arc::new(DirectoryCache::new(DirectorySources {
            nodes: Source::with_fetcher("mem://nodes", fetch),
            rooms: None,
            convention: LongitudeConvention::EastNegative,
        }))
    }

    #[tokio::test]
    async fn test_first_refresh_is_immediate() {
        let fetch = Arc::new(ScriptedFetch::default());
        fetch.set("mem://nodes", NODES);
        let cache = cache(fetch);
        let shutdown = CancellationToken::new();

        let refresher = DirectoryRefresher::new(cache.clone(), Duration::from_secs(3600));
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        for _ in 0..100 {
            if cache.current().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.current().is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_refresher() {
        let fetch = Arc::new(ScriptedFetch::default());
        let cache = cache(fetch.clone());
        let shutdown = CancellationToken::new();

        let refresher = DirectoryRefresher::new(cache.clone(), Duration::from_millis(20));
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.current().is_none());

        fetch.set("mem://nodes", NODES);
        for _ in 0..100 {
            if cache.current().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.current().is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
