//! Process-wide prometheus metrics, served from `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

pub static WORKFLOW_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "celeste_workflow_runs_total",
        "Workflow runs by outcome",
        &["outcome"]
    )
    .expect("workflow run counter registers once")
});

pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "celeste_stage_failures_total",
        "Pipeline stage failures by agent",
        &["agent"]
    )
    .expect("stage failure counter registers once")
});

pub static WORKFLOW_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "celeste_workflow_duration_seconds",
        "End-to-end workflow latency"
    )
    .expect("workflow duration histogram registers once")
});

pub static BUS_MESSAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "celeste_bus_messages_total",
        "Message bus traffic by outcome",
        &["outcome"]
    )
    .expect("bus counter registers once")
});

/// Renders the default registry in the text exposition format.
pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
