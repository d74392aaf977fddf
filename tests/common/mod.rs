use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reconcile_engine::EngineConfig;
use reconcile_engine::Identifiable;
use reconcile_engine::ReconcileError;
use reconcile_engine::Reconciler;
use reconcile_engine::ResourceKey;
use tokio::time::sleep;
use tokio::time::Instant;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub data: String,
}

impl Identifiable for Secret {
    fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.name, &self.namespace)
    }
}

pub fn secret(
    name: &str,
    namespace: &str,
    data: &str,
) -> Secret {
    Secret {
        name: name.to_string(),
        namespace: namespace.to_string(),
        data: data.to_string(),
    }
}

pub fn test_config(name: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.controller.name = name.to_string();
    config.watch.sync_poll_interval_ms = 10;
    config
}

/// Outcome scripted per key; keys without a script succeed
#[derive(Debug, Clone, Copy)]
pub enum Script {
    AlwaysFail,
}

/// Records calls with timestamps, detects same-key overlap, optionally
/// sleeps inside each call.
#[derive(Default)]
pub struct RecordingReconciler {
    calls: Mutex<Vec<(ResourceKey, Instant)>>,
    active: Mutex<HashMap<ResourceKey, usize>>,
    overlap: AtomicBool,
    scripts: Mutex<HashMap<ResourceKey, Script>>,
    delay: Duration,
}

impl RecordingReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn script(
        &self,
        key: ResourceKey,
        script: Script,
    ) {
        self.scripts.lock().insert(key, script);
    }

    pub fn calls_for(
        &self,
        key: &ResourceKey,
    ) -> usize {
        self.calls.lock().iter().filter(|(k, _)| k == key).count()
    }

    pub fn first_call_for(
        &self,
        key: &ResourceKey,
    ) -> Option<Instant> {
        self.calls.lock().iter().find(|(k, _)| k == key).map(|(_, at)| *at)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn saw_same_key_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reconciler for RecordingReconciler {
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> Result<(), ReconcileError> {
        self.calls.lock().push((key.clone(), Instant::now()));
        {
            let mut active = self.active.lock();
            let n = active.entry(key.clone()).or_insert(0);
            *n += 1;
            if *n > 1 {
                self.overlap.store(true, Ordering::SeqCst);
            }
        }

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if let Some(n) = self.active.lock().get_mut(key) {
            *n -= 1;
        }

        match self.scripts.lock().get(key) {
            Some(Script::AlwaysFail) => Err(ReconcileError::msg(format!("{} is scripted to fail", key))),
            None => Ok(()),
        }
    }
}

/// Polls `cond` every 5ms until it holds or `limit` elapses.
pub async fn wait_until<F>(
    limit: Duration,
    mut cond: F,
) -> bool
where F: FnMut() -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(5)).await;
    }
}

/// Source whose initial list never completes
pub struct StuckSource;

#[async_trait]
impl reconcile_engine::ListWatch for StuckSource {
    type Object = Secret;

    async fn list(&self) -> reconcile_engine::Result<reconcile_engine::ObjectList<Secret>> {
        std::future::pending().await
    }

    async fn watch(
        &self,
        _resource_version: u64,
    ) -> reconcile_engine::Result<reconcile_engine::WatchStream<Secret>> {
        std::future::pending().await
    }
}
