use std::env;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reconcile_engine::metrics::gather_metrics;
use reconcile_engine::EngineBuilder;
use reconcile_engine::EngineConfig;
use reconcile_engine::Error;
use reconcile_engine::Identifiable;
use reconcile_engine::InMemorySource;
use reconcile_engine::ReconcileError;
use reconcile_engine::Reconciler;
use reconcile_engine::ResourceKey;
use reconcile_engine::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const DEFAULT_LOG_DIR: &str = "./logs";
const NAMESPACES: [&str; 2] = ["team-a", "team-b"];

/// Demo object: one key/value entry of a namespaced configuration map
#[derive(Debug, Clone)]
struct ConfigEntry {
    name: String,
    namespace: String,
    value: u64,
}

impl Identifiable for ConfigEntry {
    fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.name, &self.namespace)
    }
}

/// Reads the current state of the key back from the source and logs it
struct LoggingReconciler {
    source: InMemorySource<ConfigEntry>,
}

#[async_trait]
impl Reconciler for LoggingReconciler {
    async fn reconcile(
        &self,
        key: &ResourceKey,
    ) -> std::result::Result<(), ReconcileError> {
        match self.source.get(key) {
            Some(entry) if entry.value % 7 == 0 => {
                Err(ReconcileError::msg(format!("value {} is not accepted", entry.value)))
            }
            Some(entry) => {
                info!(%key, value = entry.value, "reconciled");
                Ok(())
            }
            None => {
                info!(%key, "gone, cleaning up");
                Ok(())
            }
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = EngineConfig::new()?.validate()?;

    // Initializing Logs
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    let _guard = init_observability(Path::new(&log_dir));
    info!(?config, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let source = InMemorySource::new().with_objects(seed_entries());
    let workers = config.controller.workers;
    let engine = EngineBuilder::new(LoggingReconciler { source: source.clone() }, config)
        .add_named_watch("config-entries", source.clone(), &[])
        .build()?;

    tokio::spawn(simulate_changes(source, graceful_rx.clone()));

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = engine.run(workers, graceful_rx).await {
        error!("engine stops: {:?}", e);
    }

    debug!("final metrics:\n{}", gather_metrics());
    println!("Exiting program.");
    Ok(())
}

fn seed_entries() -> Vec<ConfigEntry> {
    NAMESPACES
        .iter()
        .flat_map(|ns| {
            (0..3).map(move |i| ConfigEntry {
                name: format!("entry-{}", i),
                namespace: ns.to_string(),
                value: 1,
            })
        })
        .collect()
}

/// Mutates random entries until shutdown, so the engine has work to do
async fn simulate_changes(
    source: InMemorySource<ConfigEntry>,
    mut stop: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                let (ns, i, value, delete) = {
                    let mut rng = rand::thread_rng();
                    (
                        NAMESPACES[rng.gen_range(0..NAMESPACES.len())],
                        rng.gen_range(0..4),
                        rng.gen_range(1..100u64),
                        rng.gen_bool(0.1),
                    )
                };
                let name = format!("entry-{}", i);
                if delete {
                    source.remove(&ResourceKey::new(&name, ns));
                } else {
                    source.upsert(ConfigEntry {
                        name,
                        namespace: ns.to_string(),
                        value,
                    });
                }
            }
        }
    }
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("SIGINT handler: {}", e)))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("SIGTERM handler: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

pub fn init_observability(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "reconcile-demo.log");

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    guard
}
