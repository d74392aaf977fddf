use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Informer;

/// Blocks until `informer` reports its initial list consumed.
///
/// Returns `false` if `token` is cancelled first. Readiness is polled every
/// `poll_interval`; an informer already synced returns without sleeping.
pub async fn wait_for_cache_sync(
    controller: &str,
    informer: &dyn Informer,
    poll_interval: Duration,
    token: &CancellationToken,
) -> bool {
    debug!(controller, watch = informer.name(), "waiting for cache sync");

    loop {
        if informer.has_synced() {
            info!(controller, watch = informer.name(), "cache sync complete");
            return true;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!(controller, watch = informer.name(), "stopped while waiting for cache sync");
                return false;
            }
            _ = sleep(poll_interval) => {}
        }
    }
}
