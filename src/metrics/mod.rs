use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    pub static ref RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_total", "Reconcile calls by outcome"),
        &["controller", "result"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_REQUEUE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_requeue_total", "Keys re-enqueued with backoff after a failed reconcile"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DROPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_dropped_total", "Keys dropped after exhausting their retry budget"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("reconcile_duration_seconds", "Wall time of a single reconcile call")
            .buckets(exponential_buckets(0.001, 2.0, 16).expect("valid buckets")),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref WORKQUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("workqueue_depth", "Keys ready to be handed to a worker"),
        &["controller"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_total", "Change notifications observed per watch and kind"),
        &["watch", "kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

/// Registers the engine collectors with [`REGISTRY`]. Safe to call repeatedly.
pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(RECONCILE_TOTAL.clone()),
            Box::new(RECONCILE_REQUEUE_TOTAL.clone()),
            Box::new(RECONCILE_DROPPED_TOTAL.clone()),
            Box::new(RECONCILE_DURATION_SECONDS.clone()),
            Box::new(WORKQUEUE_DEPTH.clone()),
            Box::new(WATCH_EVENTS_TOTAL.clone()),
        ];
        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                error!("collector can not be registered: {:?}", e);
            }
        }
    });
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    register_custom_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
