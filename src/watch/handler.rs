use std::sync::Arc;

use tracing::debug;

use super::EventFilter;
use super::EventKind;
use crate::metrics::WATCH_EVENTS_TOTAL;
use crate::Identifiable;
use crate::RateLimitedQueue;
use crate::ResourceKey;

/// Change-notifier adapter of one watch registration: turns accepted events
/// into queue keys.
pub struct EnqueueHandler {
    watch_name: String,
    filter: EventFilter,
    queue: Arc<RateLimitedQueue<ResourceKey>>,
}

impl EnqueueHandler {
    pub fn new(
        watch_name: impl Into<String>,
        filter: EventFilter,
        queue: Arc<RateLimitedQueue<ResourceKey>>,
    ) -> Self {
        Self {
            watch_name: watch_name.into(),
            filter,
            queue,
        }
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    /// Returns whether the object was enqueued
    pub fn on_event<T: Identifiable>(
        &self,
        kind: EventKind,
        object: &T,
    ) -> bool {
        WATCH_EVENTS_TOTAL
            .with_label_values(&[&self.watch_name, kind.as_str()])
            .inc();

        if !self.filter.accepts(kind) {
            return false;
        }

        let key = object.key();
        debug!(watch = %self.watch_name, %kind, %key, "enqueue");
        self.queue.add(key);
        true
    }
}
