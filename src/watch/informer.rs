//! List-then-watch driver for one registered watch.
//!
//! ## Lifecycle
//! 1. `list` the source, replace the local [`Store`], dispatch every change
//! 2. flip `has_synced` (once, never back)
//! 3. consume the watch stream from the list's resource version
//! 4. on stream error or hang-up, back off and go to 1
//!
//! When a resync period is configured, every cached object is re-dispatched
//! as an update on that period while the watch is healthy.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::EnqueueHandler;
use super::EventKind;
use super::ListWatch;
use super::Store;
use super::WatchEvent;
use crate::BackoffPolicy;
use crate::Error;
use crate::Identifiable;
use crate::Result;
use crate::WatchError;

/// Type-erased view of a running watch, as seen by the engine.
pub trait Informer: Send + Sync {
    fn name(&self) -> &str;

    /// True once the initial list has been fully consumed
    fn has_synced(&self) -> bool;

    /// Spawns the list/watch task; it exits when `token` is cancelled.
    fn start(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> JoinHandle<()>;
}

pub struct SharedInformer<S>
where S: ListWatch
{
    name: String,
    source: S,
    store: Arc<Store<S::Object>>,
    handler: EnqueueHandler,
    synced: AtomicBool,
    relist_backoff: BackoffPolicy,
    resync_period: Option<Duration>,
}

impl<S> SharedInformer<S>
where S: ListWatch
{
    pub fn new(
        name: impl Into<String>,
        source: S,
        handler: EnqueueHandler,
        relist_backoff: BackoffPolicy,
        resync_period: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            store: Arc::new(Store::new()),
            handler,
            synced: AtomicBool::new(false),
            relist_backoff,
            resync_period,
        }
    }

    pub fn store(&self) -> Arc<Store<S::Object>> {
        self.store.clone()
    }

    pub(crate) async fn run(
        &self,
        token: CancellationToken,
    ) {
        info!(watch = %self.name, "informer started");
        let mut attempt: u32 = 0;

        loop {
            match self.list_and_watch(&token, &mut attempt).await {
                Ok(()) => break,
                Err(e) => {
                    let delay = self.relist_backoff.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(watch = %self.name, ?delay, "list/watch interrupted, re-listing: {}", e);

                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(watch = %self.name, "informer stopped");
    }

    /// Returns `Ok(())` only when cancelled; every other exit is an error
    /// that calls for a re-list.
    async fn list_and_watch(
        &self,
        token: &CancellationToken,
        attempt: &mut u32,
    ) -> Result<()> {
        let list = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            list = self.source.list() => list?,
        };
        *attempt = 0;

        let resource_version = list.resource_version;
        self.replace(list.items);
        if !self.synced.swap(true, Ordering::AcqRel) {
            info!(watch = %self.name, objects = self.store.len(), resource_version, "cache synced");
        }

        let mut stream = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            stream = self.source.watch(resource_version) => stream?,
        };

        let mut resync = self.resync_period.map(|p| interval_at(Instant::now() + p, p));

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                event = stream.next() => match event {
                    Some(Ok(event)) => self.apply(event),
                    Some(Err(e)) => return Err(e),
                    None => return Err(Error::Watch(WatchError::StreamClosed)),
                },
                _ = next_resync(&mut resync) => self.resync(),
            }
        }
    }

    /// Reconciles the store with a fresh list, dispatching the difference.
    fn replace(
        &self,
        items: Vec<S::Object>,
    ) {
        let mut seen = HashSet::with_capacity(items.len());
        for item in items {
            seen.insert(item.key());
            let kind = match self.store.insert(item.clone()) {
                None => EventKind::Add,
                Some(_) => EventKind::Update,
            };
            self.handler.on_event(kind, &item);
        }

        for key in self.store.keys() {
            if !seen.contains(&key) {
                if let Some(gone) = self.store.remove(&key) {
                    self.handler.on_event(EventKind::Delete, &gone);
                }
            }
        }
    }

    fn apply(
        &self,
        event: WatchEvent<S::Object>,
    ) {
        let kind = event.kind();
        let object = event.into_object();
        match kind {
            EventKind::Add | EventKind::Update => {
                self.store.insert(object.clone());
            }
            EventKind::Delete => {
                self.store.remove(&object.key());
            }
        }
        self.handler.on_event(kind, &object);
    }

    fn resync(&self) {
        let objects = self.store.list();
        debug!(watch = %self.name, objects = objects.len(), "resync");
        for object in objects {
            self.handler.on_event(EventKind::Update, &object);
        }
    }
}

async fn next_resync(resync: &mut Option<Interval>) {
    match resync {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl<S> Informer for SharedInformer<S>
where S: ListWatch
{
    fn name(&self) -> &str {
        &self.name
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn start(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }
}
