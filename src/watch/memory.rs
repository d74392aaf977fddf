//! In-process resource collection with list/watch semantics.
//!
//! Every mutation bumps a resource version and is recorded in a bounded
//! history, so a watcher opened at version `rv` replays whatever it missed
//! since its list. Once the history no longer reaches back to `rv`, `watch`
//! fails with [`WatchError::Expired`] and the caller must re-list.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::ListWatch;
use super::ObjectList;
use super::WatchEvent;
use super::WatchStream;
use crate::Identifiable;
use crate::ResourceKey;
use crate::Result;
use crate::WatchError;

pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

struct Inner<T> {
    objects: BTreeMap<ResourceKey, T>,
    resource_version: u64,
    history: VecDeque<(u64, WatchEvent<T>)>,
    history_limit: usize,
    watchers: Vec<mpsc::UnboundedSender<Result<WatchEvent<T>>>>,
}

impl<T> Inner<T>
where T: Identifiable + Clone
{
    fn record(
        &mut self,
        event: WatchEvent<T>,
    ) {
        let key = event.object().key();
        match &event {
            WatchEvent::Added(o) | WatchEvent::Modified(o) => {
                self.objects.insert(key, o.clone());
            }
            WatchEvent::Deleted(_) => {
                self.objects.remove(&key);
            }
        }

        self.resource_version += 1;
        self.history.push_back((self.resource_version, event.clone()));
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }

        self.watchers.retain(|tx| tx.send(Ok(event.clone())).is_ok());
    }
}

/// Cloneable handle; clones share the same collection.
pub struct InMemorySource<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for InMemorySource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for InMemorySource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemorySource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                objects: BTreeMap::new(),
                resource_version: 0,
                history: VecDeque::new(),
                history_limit,
                watchers: Vec::new(),
            })),
        }
    }

    /// Seeds the collection; each object counts as one `Added` change.
    pub fn with_objects(
        self,
        objects: impl IntoIterator<Item = T>,
    ) -> Self {
        for o in objects {
            self.upsert(o);
        }
        self
    }

    /// Records a change and fans it out to open watchers.
    ///
    /// The event is delivered as given; an `Added` for an existing object is
    /// not rewritten into `Modified`.
    pub fn apply(
        &self,
        event: WatchEvent<T>,
    ) {
        let mut inner = self.inner.lock();
        inner.record(event);
    }

    /// Inserts or replaces an object, emitting `Added` or `Modified`.
    pub fn upsert(
        &self,
        object: T,
    ) {
        let mut inner = self.inner.lock();
        if inner.objects.contains_key(&object.key()) {
            inner.record(WatchEvent::Modified(object));
        } else {
            inner.record(WatchEvent::Added(object));
        }
    }

    /// Removes an object, emitting `Deleted` with its last state.
    pub fn remove(
        &self,
        key: &ResourceKey,
    ) -> Option<T> {
        let mut inner = self.inner.lock();
        let existing = inner.objects.get(key).cloned();
        if let Some(o) = &existing {
            inner.record(WatchEvent::Deleted(o.clone()));
        }
        existing
    }

    pub fn get(
        &self,
        key: &ResourceKey,
    ) -> Option<T> {
        self.inner.lock().objects.get(key).cloned()
    }

    pub fn resource_version(&self) -> u64 {
        self.inner.lock().resource_version
    }

    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ends every open watch stream, as a server dropping its connections would.
    pub fn close_watchers(&self) {
        self.inner.lock().watchers.clear();
    }

    /// Fails every open watch stream with `WatchFailed`, then detaches them.
    pub fn abort_watchers(
        &self,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        let watchers = std::mem::take(&mut self.inner.lock().watchers);
        debug!(watchers = watchers.len(), %reason, "aborting watch streams");
        for tx in watchers {
            let _ = tx.send(Err(WatchError::WatchFailed(reason.clone()).into()));
        }
    }

    /// Open watch streams still attached to this source
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|tx| !tx.is_closed());
        inner.watchers.len()
    }
}

#[async_trait]
impl<T> ListWatch for InMemorySource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    type Object = T;

    async fn list(&self) -> Result<ObjectList<T>> {
        let inner = self.inner.lock();
        Ok(ObjectList {
            items: inner.objects.values().cloned().collect(),
            resource_version: inner.resource_version,
        })
    }

    async fn watch(
        &self,
        resource_version: u64,
    ) -> Result<WatchStream<T>> {
        let mut inner = self.inner.lock();

        if resource_version < inner.resource_version {
            let oldest = inner.history.front().map(|(rv, _)| *rv);
            // the change right after `resource_version` must still be retained
            if oldest.map_or(true, |oldest| oldest > resource_version + 1) {
                return Err(WatchError::Expired { resource_version }.into());
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (rv, event) in inner.history.iter() {
            if *rv > resource_version {
                let _ = tx.send(Ok(event.clone()));
            }
        }
        inner.watchers.push(tx);
        debug!(resource_version, "watch opened");

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
