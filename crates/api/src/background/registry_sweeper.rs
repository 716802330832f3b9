//! Periodic eviction of stale ephemeral job entries.
//!
//! Spawns only when the API runs on the in-memory job store: the function
//! takes the concrete [`MemoryJobStore`], so the persisted table can never
//! be swept. Entries older than the retention window are deleted on a
//! fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use vireo_db::store::MemoryJobStore;

/// Default retention window: 24 hours.
const DEFAULT_RETENTION_HOURS: i64 = 24;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the registry sweep loop.
///
/// Evicts entries whose `created_at` is older than `retention_hours`
/// (defaults to 24, overridable via `REGISTRY_RETENTION_HOURS`). Runs
/// until `cancel` is triggered.
pub async fn run(store: Arc<MemoryJobStore>, cancel: CancellationToken) {
    let retention_hours: i64 = std::env::var("REGISTRY_RETENTION_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETENTION_HOURS);

    tracing::info!(
        retention_hours,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Registry sweeper started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Registry sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);
                let evicted = store.evict_older_than(cutoff).await;
                if evicted > 0 {
                    let remaining = store.len().await;
                    tracing::info!(evicted, remaining, "Registry sweep: evicted stale jobs");
                } else {
                    tracing::debug!("Registry sweep: nothing to evict");
                }
            }
        }
    }
}
