//! Prometheus metrics for the relay.
//!
//! Counters cover the enqueue pipeline (accepted, duplicates, suppressed,
//! queue-full rejections) and the delivery loop (attempts by outcome,
//! retries, dead letters); gauges track queue depth and in-flight work.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "alert_relay";

lazy_static! {
    /// Messages accepted into the queue
    pub static ref ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_enqueued_total", METRIC_PREFIX),
        "Messages accepted into the delivery queue"
    ).unwrap();

    /// Messages rejected as duplicates within the dedup TTL
    pub static ref DUPLICATES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_duplicates_total", METRIC_PREFIX),
        "Messages rejected as duplicates within the dedup TTL"
    ).unwrap();

    /// Non-critical messages suppressed by quiet hours
    pub static ref SUPPRESSED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_suppressed_total", METRIC_PREFIX),
        "Non-critical messages suppressed during quiet hours"
    ).unwrap();

    /// Messages rejected because the queue was at capacity
    pub static ref QUEUE_FULL_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_full_total", METRIC_PREFIX),
        "Messages rejected because the queue was at capacity"
    ).unwrap();

    /// Completed delivery attempts by outcome (success, transient, permanent)
    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_attempts_total", METRIC_PREFIX),
        "Completed delivery attempts by outcome",
        &["outcome"]
    ).unwrap();

    /// Retries scheduled after transient failures
    pub static ref RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_retries_total", METRIC_PREFIX),
        "Retries scheduled after transient failures"
    ).unwrap();

    /// Messages moved to the dead-letter store
    pub static ref DEAD_LETTER_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dead_letter_total", METRIC_PREFIX),
        "Messages moved to the dead-letter store"
    ).unwrap();

    /// Current queue depth
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Messages currently waiting in the queue"
    ).unwrap();

    /// Messages owned by the worker or a retry timer
    pub static ref IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_in_flight", METRIC_PREFIX),
        "Messages currently being delivered or awaiting a retry timer"
    ).unwrap();

    /// Webhook response time distribution
    pub static ref RESPONSE_SECONDS: Histogram = register_histogram!(
        format!("{}_response_seconds", METRIC_PREFIX),
        "Webhook response time in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}

/// Attempt outcome labels for [`ATTEMPTS_TOTAL`].
pub mod outcome {
    pub const SUCCESS: &str = "success";
    pub const TRANSIENT: &str = "transient";
    pub const PERMANENT: &str = "permanent";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        // Touching each lazy static must not panic on double registration
        ENQUEUED_TOTAL.inc();
        DUPLICATES_TOTAL.inc();
        ATTEMPTS_TOTAL.with_label_values(&[outcome::SUCCESS]).inc();
        QUEUE_DEPTH.set(3);
        assert!(ENQUEUED_TOTAL.get() >= 1);
    }
}
