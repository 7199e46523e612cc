//! Expiration Sweeper Task
//!
//! Optional background task that deletes expired rows of a cache's partition
//! so they do not linger until the next read.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TableCache;
use crate::store::{Connector, ScanPartition};

/// Spawns a task that purges expired entries every `sweep_interval_secs`.
///
/// The task stops when `shutdown` is cancelled; an in-progress sweep is
/// abandoned at its next store call. A failed sweep is logged and retried
/// on the next tick.
///
/// # Example
/// ```ignore
/// let shutdown = CancellationToken::new();
/// let sweeper = spawn_sweeper_task(cache.clone(), 60, shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// sweeper.await?;
/// ```
pub fn spawn_sweeper_task<C>(
    cache: Arc<TableCache<C>>,
    sweep_interval_secs: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    C: Connector + 'static,
    C::Store: ScanPartition,
{
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiration sweeper with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            match cache.purge_expired(&shutdown).await {
                Ok(removed) if removed > 0 => {
                    info!("Expiration sweep: removed {} expired entries", removed);
                }
                Ok(_) => debug!("Expiration sweep: no expired entries found"),
                Err(e) if shutdown.is_cancelled() => {
                    debug!("Expiration sweep interrupted: {}", e);
                }
                Err(e) => warn!("Expiration sweep failed: {}", e),
            }
        }

        info!("Expiration sweeper stopped");
    })
}
