use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::metrics::RECONCILE_DROPPED_TOTAL;
use crate::metrics::RECONCILE_DURATION_SECONDS;
use crate::metrics::RECONCILE_REQUEUE_TOTAL;
use crate::metrics::RECONCILE_TOTAL;
use crate::RateLimitedQueue;
use crate::Reconciler;
use crate::ResourceKey;

/// What happened to a key after one reconcile attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconcileOutcome {
    Succeeded,
    /// Failed and re-enqueued with backoff
    Requeued,
    /// Failed with the retry budget exhausted
    Dropped,
}

impl ReconcileOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Succeeded => "success",
            ReconcileOutcome::Requeued => "requeue",
            ReconcileOutcome::Dropped => "dropped",
        }
    }
}

/// One pool member: dequeue, reconcile, ack or retry, release.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) controller: String,
    pub(crate) max_requeue_attempts: u32,
    pub(crate) queue: Arc<RateLimitedQueue<ResourceKey>>,
    pub(crate) reconciler: Arc<dyn Reconciler>,
}

/// Releases a checked-out key when dropped, including while a panic unwinds
/// out of `reconcile`.
struct Checkout<'a> {
    queue: &'a RateLimitedQueue<ResourceKey>,
    key: ResourceKey,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

impl Worker {
    /// Runs until the queue shuts down.
    ///
    /// A panic inside `reconcile` still ends the task, but the key is
    /// released on the way out so later adds for it are delivered again.
    pub(crate) async fn run(self) {
        debug!(controller = %self.controller, worker = self.id, "worker started");

        while let Some(key) = self.queue.get().await {
            let checkout = Checkout {
                queue: &self.queue,
                key,
            };
            self.process(&checkout.key).await;
        }

        debug!(controller = %self.controller, worker = self.id, "worker exited");
    }

    pub(crate) async fn process(
        &self,
        key: &ResourceKey,
    ) -> ReconcileOutcome {
        debug!(controller = %self.controller, worker = self.id, %key, "reconciling");

        let started = Instant::now();
        let result = self.reconciler.reconcile(key).await;
        RECONCILE_DURATION_SECONDS
            .with_label_values(&[&self.controller])
            .observe(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(()) => {
                self.queue.forget(key);
                ReconcileOutcome::Succeeded
            }
            Err(e) => {
                let requeues = self.queue.num_requeues(key);
                if requeues < self.max_requeue_attempts {
                    warn!(controller = %self.controller, %key, requeues, "reconcile failed, requeueing: {}", e);
                    self.queue.add_rate_limited(key.clone());
                    RECONCILE_REQUEUE_TOTAL.with_label_values(&[&self.controller]).inc();
                    ReconcileOutcome::Requeued
                } else {
                    error!(
                        controller = %self.controller,
                        %key,
                        requeues,
                        "dropping key after {} retries: {}",
                        self.max_requeue_attempts,
                        e
                    );
                    self.queue.forget(key);
                    RECONCILE_DROPPED_TOTAL.with_label_values(&[&self.controller]).inc();
                    ReconcileOutcome::Dropped
                }
            }
        };

        RECONCILE_TOTAL
            .with_label_values(&[&self.controller, outcome.as_str()])
            .inc();
        outcome
    }
}
