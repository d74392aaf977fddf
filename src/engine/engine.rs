//! Running side of the engine.
//!
//! ## Lifecycle
//! - **Syncing**: informers start one by one, in registration order, each
//!   awaited until its initial list is consumed. A stop during this phase
//!   aborts `run` before any worker exists.
//! - **Running**: `worker_count` workers drain the shared queue.
//! - **ShuttingDown**: the queue stops handing out keys; in-flight
//!   reconciles finish; informers are cancelled.
//!
//! The stop signal is a `watch::Receiver<()>`: a send or a dropped sender
//! both count.

use std::any::Any;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::FutureExt;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::EngineState;
use super::Worker;
use crate::wait_for_cache_sync;
use crate::EngineConfig;
use crate::EngineError;
use crate::Informer;
use crate::RateLimitedQueue;
use crate::Reconciler;
use crate::ResourceKey;
use crate::Result;

pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) reconciler: Arc<dyn Reconciler>,
    pub(super) informers: Vec<Arc<dyn Informer>>,
    pub(super) queue: Arc<RateLimitedQueue<ResourceKey>>,
    pub(super) state_tx: watch::Sender<EngineState>,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared work queue, for observability and tests
    pub fn queue(&self) -> Arc<RateLimitedQueue<ResourceKey>> {
        self.queue.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> EngineState {
        *self.state_tx.borrow()
    }

    /// Blocks until `stop` fires.
    ///
    /// Returns [`EngineError::CacheSyncAborted`] if the stop came before every
    /// watch synced; no reconcile has run in that case.
    pub async fn run(
        self,
        worker_count: usize,
        stop: watch::Receiver<()>,
    ) -> Result<()> {
        if worker_count == 0 {
            self.set_state(EngineState::Stopped);
            return Err(EngineError::InvalidWorkerCount.into());
        }

        let token = CancellationToken::new();
        let stop_listener = spawn_stop_listener(stop, token.clone());

        let result = self.run_until_cancelled(worker_count, &token).await;

        stop_listener.abort();
        self.set_state(EngineState::Stopped);
        result
    }

    async fn run_until_cancelled(
        &self,
        worker_count: usize,
        token: &CancellationToken,
    ) -> Result<()> {
        let controller = self.config.controller.name.as_str();

        // Phase 1: cache sync
        self.set_state(EngineState::Syncing);
        let informer_token = token.child_token();
        let mut informer_handles = Vec::with_capacity(self.informers.len());
        for informer in &self.informers {
            informer_handles.push(informer.clone().start(informer_token.clone()));

            let synced = wait_for_cache_sync(
                controller,
                informer.as_ref(),
                self.config.watch.sync_poll_interval(),
                token,
            )
            .await;

            if !synced {
                self.queue.shut_down();
                informer_token.cancel();
                join_informers(informer_handles).await;
                return Err(EngineError::CacheSyncAborted {
                    watch: informer.name().to_string(),
                }
                .into());
            }
        }

        // Phase 2: worker pool
        self.set_state(EngineState::Running);
        let mut workers: FuturesUnordered<_> = (0..worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    controller: controller.to_string(),
                    max_requeue_attempts: self.config.controller.max_requeue_attempts,
                    queue: self.queue.clone(),
                    reconciler: self.reconciler.clone(),
                };
                tokio::spawn(worker.run()).map(move |r| (id, r))
            })
            .collect();
        info!(controller, worker_count, "workers started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                Some((id, r)) = workers.next() => report_worker_exit(controller, id, r),
            }
        }

        // Phase 3: drain
        self.set_state(EngineState::ShuttingDown);
        self.queue.shut_down();
        while let Some((id, r)) = workers.next().await {
            report_worker_exit(controller, id, r);
        }
        informer_token.cancel();
        join_informers(informer_handles).await;

        info!(controller, "engine stopped");
        Ok(())
    }

    fn set_state(
        &self,
        state: EngineState,
    ) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(controller = %self.config.controller.name, from = %previous, to = %state, "engine state changed");
        }
    }
}

fn spawn_stop_listener(
    mut stop: watch::Receiver<()>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Err means the sender is gone, which is a stop as well
        let _ = stop.changed().await;
        info!("stop signal received");
        token.cancel();
    })
}

async fn join_informers(handles: Vec<JoinHandle<()>>) {
    for r in futures::future::join_all(handles).await {
        if let Err(e) = r {
            error!("informer task failed: {}", e);
        }
    }
}

fn report_worker_exit(
    controller: &str,
    worker_id: usize,
    result: std::result::Result<(), JoinError>,
) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            let reason = panic_reason(e.into_panic());
            error!(controller, "{}", EngineError::WorkerPanicked { worker_id, reason });
        }
        Err(e) => error!(controller, worker_id, "worker task failed: {}", e),
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
