use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ReconcileError;
use crate::Reconciler;
use crate::ResourceKey;

/// Records every call and tracks overlap, both per key and across keys.
#[derive(Default)]
pub struct RecordingReconciler {
    calls: Mutex<Vec<ResourceKey>>,
    active: Mutex<HashMap<ResourceKey, usize>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    same_key_overlap: AtomicBool,
    delay: Duration,
}

impl RecordingReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before returning
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ResourceKey> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(
        &self,
        key: &ResourceKey,
    ) -> usize {
        self.calls.lock().iter().filter(|k| *k == key).count()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// True if two calls for the same key ever ran at the same time
    pub fn saw_same_key_overlap(&self) -> bool {
        self.same_key_overlap.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reconciler for RecordingReconciler {
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> Result<(), ReconcileError> {
        self.calls.lock().push(key.clone());
        {
            let mut active = self.active.lock();
            let n = active.entry(key.clone()).or_insert(0);
            *n += 1;
            if *n > 1 {
                self.same_key_overlap.store(true, Ordering::SeqCst);
            }
        }
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        if let Some(n) = self.active.lock().get_mut(key) {
            *n -= 1;
        }
        Ok(())
    }
}

/// Fails the first `failures` calls for every key, then succeeds.
/// `u32::MAX` fails forever.
pub struct FailingReconciler {
    failures: u32,
    attempts: Mutex<HashMap<ResourceKey, u32>>,
}

impl FailingReconciler {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn always() -> Self {
        Self::new(u32::MAX)
    }

    pub fn attempts(
        &self,
        key: &ResourceKey,
    ) -> u32 {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Reconciler for FailingReconciler {
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> Result<(), ReconcileError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(key.clone()).or_insert(0);
            *n += 1;
            *n
        };
        if attempt <= self.failures {
            return Err(ReconcileError::msg(format!("attempt {} for {} failed", attempt, key)));
        }
        Ok(())
    }
}
