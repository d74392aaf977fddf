//! Reconciliation Engine Error Hierarchy
//!
//! Errors are grouped by where they surface:
//! - configuration loading and validation
//! - engine lifecycle (cache sync, worker pool)
//! - list/watch sources feeding the informers
//!
//! Errors returned by a [`crate::Reconciler`] are a separate type,
//! [`ReconcileError`], because they never escape the worker loop.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Engine configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine lifecycle failures
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// List/watch source failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The stop signal fired before a watch finished its initial list.
    /// No worker was started.
    #[error("Cache sync for watch {watch} aborted before completion")]
    CacheSyncAborted { watch: String },

    /// `run` was asked to start an empty worker pool
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    /// A worker task ended by panicking inside a reconcile call
    #[error("Worker {worker_id} panicked: {reason}")]
    WorkerPanicked { worker_id: usize, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Initial or recovery list failed
    #[error("List failed: {0}")]
    ListFailed(String),

    /// Opening or consuming the watch stream failed
    #[error("Watch failed: {0}")]
    WatchFailed(String),

    /// The requested resource version is no longer available; a re-list is required
    #[error("Resource version {resource_version} is too old")]
    Expired { resource_version: u64 },

    /// The source hung up the stream
    #[error("Watch stream closed by source")]
    StreamClosed,
}

/// Failure reported by a [`crate::Reconciler`] for a single key.
///
/// The engine only inspects whether a reconcile failed, never why; the source
/// error is kept for logging.
#[derive(Debug, thiserror::Error)]
#[error("Reconcile failed: {source}")]
pub struct ReconcileError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl ReconcileError {
    pub fn new<E>(source: E) -> Self
    where E: Into<Box<dyn std::error::Error + Send + Sync>> {
        Self { source: source.into() }
    }

    /// Convenience constructor from a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }
}

impl From<Error> for ReconcileError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}
