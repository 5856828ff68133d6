//! Prometheus metrics for the fan-out service.
//!
//! Covers the three suspension points of an invocation:
//! - Trigger intake (events received, invocation results)
//! - Push channel (addresses delivered / failed, call failures, latency)
//! - Notification log (entries persisted, batch commit failures)

mod helpers;

pub use helpers::{encode_metrics, InvocationMetrics, LogMetrics, PushMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "fanout";

lazy_static! {
    // ============================================================================
    // Trigger Metrics
    // ============================================================================

    /// Events received from the trigger adapters, by record kind
    pub static ref EVENTS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_received_total", METRIC_PREFIX),
        "Total record lifecycle events received",
        &["kind"]
    ).unwrap();

    /// Invocations by result (success, skipped, failure)
    pub static ref INVOCATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_invocations_total", METRIC_PREFIX),
        "Total dispatch invocations by result",
        &["result"]
    ).unwrap();

    // ============================================================================
    // Push Metrics
    // ============================================================================

    /// Addresses the push channel accepted
    pub static ref PUSH_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_delivered_total", METRIC_PREFIX),
        "Total push addresses accepted by the channel"
    ).unwrap();

    /// Addresses the push channel rejected
    pub static ref PUSH_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_failed_total", METRIC_PREFIX),
        "Total push addresses rejected or not reached"
    ).unwrap();

    /// Multicast calls that failed as a whole
    pub static ref PUSH_CALL_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_call_failures_total", METRIC_PREFIX),
        "Total multicast calls that failed at channel level"
    ).unwrap();

    /// Multicast call latency
    pub static ref PUSH_CALL_LATENCY: Histogram = register_histogram!(
        format!("{}_push_call_latency_seconds", METRIC_PREFIX),
        "Multicast push call latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Addresses reported as invalid by the token hygiene reporter
    pub static ref INVALID_TOKENS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_invalid_tokens_total", METRIC_PREFIX),
        "Total push addresses reported for invalidation"
    ).unwrap();

    // ============================================================================
    // Notification Log Metrics
    // ============================================================================

    /// In-app notification entries committed
    pub static ref LOG_ENTRIES_PERSISTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_log_entries_persisted_total", METRIC_PREFIX),
        "Total in-app notification entries committed"
    ).unwrap();

    /// Batches that failed to commit
    pub static ref LOG_BATCH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_log_batch_failures_total", METRIC_PREFIX),
        "Total notification log batches that failed to commit"
    ).unwrap();
}
