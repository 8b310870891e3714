//! Delivery statistics.
//!
//! Counters are atomic and updated by the enqueue path and the single
//! delivery worker; readers take a point-in-time [`StatisticsSnapshot`].
//!
//! Accounting invariant, at quiescence (nothing queued or in flight):
//! `total_enqueued == successful + failed + duplicates_rejected`.
//! With work outstanding, the difference is the current queue depth plus
//! in-flight messages.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Weight of history in the response-time moving average.
const EWMA_HISTORY_WEIGHT: f64 = 0.9;

#[derive(Debug, Default)]
pub struct RelayStats {
    /// Accepted messages plus duplicate rejections
    pub total_enqueued: AtomicU64,
    /// Completed delivery attempts (every outcome)
    pub total_sent: AtomicU64,
    /// Messages delivered successfully
    pub successful: AtomicU64,
    /// Messages dead-lettered after exhausting retries (or a permanent failure)
    pub failed: AtomicU64,
    /// Messages rejected by the dedup cache
    pub duplicates_rejected: AtomicU64,
    /// Retries scheduled after transient failures
    pub retry_attempts: AtomicU64,
    /// Non-critical messages suppressed by quiet hours
    pub suppressed: AtomicU64,
    /// EWMA of response time in milliseconds (f64 bits; single writer)
    avg_response_ms_bits: AtomicU64,
    /// Unix milliseconds of the last completed send, 0 if none
    last_send_unix_ms: AtomicI64,
}

impl RelayStats {
    /// Fold one observed response time into the moving average.
    /// Only the delivery worker calls this, so load/store is sufficient.
    pub fn record_response_time(&self, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        let current = f64::from_bits(self.avg_response_ms_bits.load(Ordering::Relaxed));
        let updated = if current == 0.0 {
            sample_ms
        } else {
            current * EWMA_HISTORY_WEIGHT + sample_ms * (1.0 - EWMA_HISTORY_WEIGHT)
        };
        self.avg_response_ms_bits
            .store(updated.to_bits(), Ordering::Relaxed);
    }

    pub fn mark_sent_now(&self) {
        self.last_send_unix_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let total_sent = self.total_sent.load(Ordering::Relaxed);
        let successful = self.successful.load(Ordering::Relaxed);
        let success_rate = if total_sent > 0 {
            successful as f64 / total_sent as f64
        } else {
            0.0
        };
        let last_ms = self.last_send_unix_ms.load(Ordering::Relaxed);

        StatisticsSnapshot {
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_sent,
            successful,
            failed: self.failed.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            average_response_time_ms: f64::from_bits(
                self.avg_response_ms_bits.load(Ordering::Relaxed),
            ),
            success_rate,
            last_send_time: (last_ms != 0).then(|| DateTime::from_timestamp_millis(last_ms)).flatten(),
        }
    }
}

/// Point-in-time view of the running counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSnapshot {
    pub total_enqueued: u64,
    pub total_sent: u64,
    pub successful: u64,
    pub failed: u64,
    pub duplicates_rejected: u64,
    pub retry_attempts: u64,
    pub suppressed: u64,
    pub average_response_time_ms: f64,
    /// Successful share of completed attempts
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_send_time: Option<DateTime<Utc>>,
}
