//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    EVENTS_RECEIVED_TOTAL, INVALID_TOKENS_TOTAL, INVOCATIONS_TOTAL, LOG_BATCH_FAILURES_TOTAL,
    LOG_ENTRIES_PERSISTED_TOTAL, PUSH_CALL_FAILURES_TOTAL, PUSH_CALL_LATENCY,
    PUSH_DELIVERED_TOTAL, PUSH_FAILED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording trigger and invocation metrics
pub struct InvocationMetrics;

impl InvocationMetrics {
    /// Record an event received for a record kind
    pub fn record_event(kind: &str) {
        EVENTS_RECEIVED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_success() {
        INVOCATIONS_TOTAL.with_label_values(&["success"]).inc();
    }

    pub fn record_skipped() {
        INVOCATIONS_TOTAL.with_label_values(&["skipped"]).inc();
    }

    pub fn record_failure() {
        INVOCATIONS_TOTAL.with_label_values(&["failure"]).inc();
    }
}

/// Helper struct for recording push channel metrics
pub struct PushMetrics;

impl PushMetrics {
    /// Record per-address results of one multicast call
    pub fn record_outcomes(delivered: u64, failed: u64) {
        PUSH_DELIVERED_TOTAL.inc_by(delivered);
        PUSH_FAILED_TOTAL.inc_by(failed);
    }

    /// Record a multicast call that failed as a whole
    pub fn record_call_failure() {
        PUSH_CALL_FAILURES_TOTAL.inc();
    }

    /// Record multicast call latency
    pub fn record_latency_ms(latency_ms: u64) {
        PUSH_CALL_LATENCY.observe(latency_ms as f64 / 1000.0);
    }

    /// Record addresses flagged for invalidation
    pub fn record_invalid_tokens(count: u64) {
        INVALID_TOKENS_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording notification log metrics
pub struct LogMetrics;

impl LogMetrics {
    pub fn record_persisted(count: u64) {
        LOG_ENTRIES_PERSISTED_TOTAL.inc_by(count);
    }

    pub fn record_batch_failure() {
        LOG_BATCH_FAILURES_TOTAL.inc();
    }
}
