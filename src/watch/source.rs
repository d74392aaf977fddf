use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::ObjectList;
use super::WatchEvent;
use crate::Identifiable;
use crate::Result;

/// Incremental change stream opened by [`ListWatch::watch`]
pub type WatchStream<T> = BoxStream<'static, Result<WatchEvent<T>>>;

/// List-then-watch access to one resource collection.
///
/// `watch(rv)` must deliver every change after `rv`, or fail with
/// [`crate::WatchError::Expired`] when that history is gone.
#[async_trait]
pub trait ListWatch: Send + Sync + 'static {
    type Object: Identifiable + Clone + Send + Sync + 'static;

    async fn list(&self) -> Result<ObjectList<Self::Object>>;

    async fn watch(
        &self,
        resource_version: u64,
    ) -> Result<WatchStream<Self::Object>>;
}

#[async_trait]
impl<S> ListWatch for Arc<S>
where S: ListWatch
{
    type Object = S::Object;

    async fn list(&self) -> Result<ObjectList<Self::Object>> {
        (**self).list().await
    }

    async fn watch(
        &self,
        resource_version: u64,
    ) -> Result<WatchStream<Self::Object>> {
        (**self).watch(resource_version).await
    }
}
