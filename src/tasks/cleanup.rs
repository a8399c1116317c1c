//! Expiry Cleanup Task
//!
//! Background task that periodically drops age-expired cached results.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::ShelterService;

/// Spawns a background task that periodically removes expired cached results.
///
/// Expired entries are already treated as misses on lookup; this task only
/// reclaims their memory. The returned handle is aborted on shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(service.clone(), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    service: Arc<ShelterService>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = service.cleanup_expired();
            if removed > 0 {
                info!("Cache cleanup: removed {} expired results", removed);
            } else {
                debug!("Cache cleanup: no expired results found");
            }
        }
    })
}
