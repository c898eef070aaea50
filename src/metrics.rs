//! Process-wide Prometheus registry for run and driver metrics.

use cdp_adapter::metrics as cdp_metrics;
use lazy_static::lazy_static;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

lazy_static! {
    static ref RUNS_STARTED: IntCounter =
        IntCounter::new("remixpilot_runs_started_total", "Runs accepted and launched").unwrap();
    static ref RUNS_FINISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("remixpilot_runs_finished_total", "Runs finished by final phase"),
        &["phase"]
    )
    .unwrap();
    static ref RUN_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("remixpilot_run_rejections_total", "Start requests rejected"),
        &["reason"]
    )
    .unwrap();
    static ref ITERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("remixpilot_iterations_total", "Iterations by how they ended"),
        &["end"]
    )
    .unwrap();
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cdp_metrics::register_metrics(registry);
        for collector in [
            Box::new(RUNS_STARTED.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(RUNS_FINISHED.clone()),
            Box::new(RUN_REJECTIONS.clone()),
            Box::new(ITERATIONS.clone()),
        ] {
            if let Err(err) = registry.register(collector) {
                error!(?err, "failed to register run metric");
            }
        }
    });
}

pub fn record_run_started() {
    RUNS_STARTED.inc();
}

pub fn record_run_finished(phase: &str) {
    RUNS_FINISHED.with_label_values(&[phase]).inc();
}

pub fn record_run_rejected(reason: &str) {
    RUN_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn record_iteration(end: &str) {
    ITERATIONS.with_label_values(&[end]).inc();
}

/// Text exposition of every registered metric.
pub fn render() -> Result<String, prometheus::Error> {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&global_registry().gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

pub fn content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}
