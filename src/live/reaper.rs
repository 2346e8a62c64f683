//! Periodic stale-session sweep.

use std::sync::Arc;

use crate::live::feed::LiveFeed;

/// Spawn the background sweep task. Every `sweep_interval` it evicts
/// sessions that stopped sending telemetry without signaling completion.
/// The sweep is O(active sessions) per tick, which is fine at the target
/// scale of tens to low hundreds of concurrent players.
pub fn spawn_reaper(feed: Arc<LiveFeed>) -> tokio::task::JoinHandle<()> {
    let interval = feed.timeouts().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = feed.sweep_stale();
            if !evicted.is_empty() {
                tracing::debug!(count = evicted.len(), "Stale sweep evicted sessions");
            }
        }
    })
}
