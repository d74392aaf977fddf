//! Two-phase construction of an [`Engine`].
//!
//! Watches are only accepted here; once `build` returns, the set of
//! registrations is fixed for the lifetime of the engine.
//!
//! ## Example
//! ```ignore
//! let source = InMemorySource::new();
//! let engine = EngineBuilder::new(MyReconciler::default(), EngineConfig::new()?)
//!     .add_watch(source.clone(), &[])              // Add, Update and Delete
//!     .add_watch(other_source, &[EventKind::Update])
//!     .build()?;
//!
//! let (stop_tx, stop_rx) = watch::channel(());
//! tokio::spawn(engine.run(4, stop_rx));
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::Engine;
use super::EngineState;
use crate::default_controller_rate_limiter;
use crate::metrics;
use crate::EngineConfig;
use crate::EnqueueHandler;
use crate::EventFilter;
use crate::EventKind;
use crate::Informer;
use crate::ListWatch;
use crate::RateLimitedQueue;
use crate::Reconciler;
use crate::ResourceKey;
use crate::Result;
use crate::SharedInformer;

/// Deferred informer construction: the queue only exists once the
/// configuration has been validated.
type WatchFactory = Box<dyn FnOnce(&EngineConfig, Arc<RateLimitedQueue<ResourceKey>>) -> Arc<dyn Informer> + Send>;

pub struct EngineBuilder {
    config: EngineConfig,
    reconciler: Arc<dyn Reconciler>,
    watches: Vec<WatchFactory>,
}

impl EngineBuilder {
    pub fn new<R>(
        reconciler: R,
        config: EngineConfig,
    ) -> Self
    where
        R: Reconciler,
    {
        Self {
            config,
            reconciler: Arc::new(reconciler),
            watches: Vec::new(),
        }
    }

    /// Registers a watch named after its object type.
    ///
    /// An empty `kinds` slice subscribes to Add, Update and Delete.
    pub fn add_watch<S>(
        self,
        source: S,
        kinds: &[EventKind],
    ) -> Self
    where
        S: ListWatch,
    {
        let name = format!("{}-{}", short_type_name::<S::Object>(), self.watches.len());
        self.add_named_watch(name, source, kinds)
    }

    /// Same as [`EngineBuilder::add_watch`] with an explicit name for logs and metrics.
    pub fn add_named_watch<S>(
        mut self,
        name: impl Into<String>,
        source: S,
        kinds: &[EventKind],
    ) -> Self
    where
        S: ListWatch,
    {
        let name = name.into();
        let filter = EventFilter::from_kinds(kinds);
        debug!(watch = %name, ?filter, "watch registered");

        let factory: WatchFactory = Box::new(
            move |config: &EngineConfig, queue: Arc<RateLimitedQueue<ResourceKey>>| -> Arc<dyn Informer> {
                let handler = EnqueueHandler::new(name.clone(), filter, queue);
                Arc::new(SharedInformer::new(
                    name,
                    source,
                    handler,
                    config.watch.relist_backoff,
                    config.controller.resync_period(),
                ))
            },
        );
        self.watches.push(factory);
        self
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Validates the configuration and freezes the registrations.
    pub fn build(self) -> Result<Engine> {
        let config = self.config.validate()?;
        metrics::register_custom_metrics();

        let depth = metrics::WORKQUEUE_DEPTH.with_label_values(&[config.controller.name.as_str()]);
        let queue = Arc::new(
            RateLimitedQueue::new(Box::new(default_controller_rate_limiter(&config.queue))).with_depth_gauge(depth),
        );

        let informers = self
            .watches
            .into_iter()
            .map(|factory| factory(&config, queue.clone()))
            .collect();

        let (state_tx, _) = watch::channel(EngineState::NotStarted);

        Ok(Engine {
            config,
            reconciler: self.reconciler,
            informers,
            queue,
            state_tx,
        })
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    // strip generic arguments before taking the last path segment
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
