use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::ReconcileError;
use crate::ResourceKey;

/// Domain logic driven by the engine.
///
/// Implementations must be idempotent and re-derive desired state from the
/// current external state on every call: the engine only promises that
/// *something* changed for `key`, never what or in which order.
///
/// Calls for distinct keys run concurrently; calls for the same key never
/// overlap.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> Result<(), ReconcileError>;
}

#[async_trait]
impl<R> Reconciler for Arc<R>
where R: Reconciler + ?Sized
{
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> Result<(), ReconcileError> {
        (**self).reconcile(key).await
    }
}
