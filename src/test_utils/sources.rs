use std::marker::PhantomData;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use crate::InMemorySource;
use crate::Identifiable;
use crate::ListWatch;
use crate::ObjectList;
use crate::Result;
use crate::WatchError;
use crate::WatchStream;

/// A source whose list never completes; its informer never syncs.
pub struct StuckSource<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for StuckSource<T> {
    fn default() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> StuckSource<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T> ListWatch for StuckSource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    type Object = T;

    async fn list(&self) -> Result<ObjectList<T>> {
        std::future::pending().await
    }

    async fn watch(
        &self,
        _resource_version: u64,
    ) -> Result<WatchStream<T>> {
        std::future::pending().await
    }
}

/// Wraps an [`InMemorySource`], failing the first `list_failures` lists.
pub struct FlakySource<T> {
    inner: InMemorySource<T>,
    list_failures: AtomicU32,
    lists: AtomicU32,
}

impl<T> FlakySource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    pub fn new(
        inner: InMemorySource<T>,
        list_failures: u32,
    ) -> Self {
        Self {
            inner,
            list_failures: AtomicU32::new(list_failures),
            lists: AtomicU32::new(0),
        }
    }

    /// Number of list calls made, failed ones included
    pub fn lists(&self) -> u32 {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T> ListWatch for FlakySource<T>
where T: Identifiable + Clone + Send + Sync + 'static
{
    type Object = T;

    async fn list(&self) -> Result<ObjectList<T>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WatchError::ListFailed("injected list failure".into()).into());
        }
        self.inner.list().await
    }

    async fn watch(
        &self,
        resource_version: u64,
    ) -> Result<WatchStream<T>> {
        self.inner.watch(resource_version).await
    }
}
