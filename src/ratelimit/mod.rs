//! Per-endpoint delivery pacing.
//!
//! A token bucket with lock-free atomic refill. The delivery worker
//! consumes one token per outbound request; when the bucket is empty the
//! message is deferred on a timer rather than dropped, and the deferral
//! does not count against the retry budget.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

#[derive(Debug)]
pub struct TokenBucket {
    tokens: AtomicU32,
    /// Last refill timestamp (Unix milliseconds)
    last_refill: AtomicI64,
    capacity: u32,
    /// Tokens added per second
    refill_rate: u32,
}

impl TokenBucket {
    /// A bucket allowing `rate_per_sec` sustained requests per second with
    /// a burst of the same size.
    pub fn new(rate_per_sec: u32) -> Self {
        let rate = rate_per_sec.max(1);
        Self {
            tokens: AtomicU32::new(rate),
            last_refill: AtomicI64::new(Self::now_millis()),
            capacity: rate,
            refill_rate: rate,
        }
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    /// Try to consume one token. Returns false when the bucket is empty.
    pub fn try_consume(&self) -> bool {
        let now = Self::now_millis();
        let last = self.last_refill.load(Ordering::Relaxed);
        let elapsed_ms = (now - last).max(0) as u64;
        let tokens_to_add = (elapsed_ms * self.refill_rate as u64 / 1000) as u32;

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            let refilled = current.saturating_add(tokens_to_add).min(self.capacity);

            if refilled == 0 {
                return false;
            }

            if self
                .tokens
                .compare_exchange_weak(current, refilled - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                if tokens_to_add > 0 {
                    self.last_refill.store(now, Ordering::Relaxed);
                }
                return true;
            }
            // CAS lost to a concurrent update, retry
        }
    }

    /// How long until the bucket is expected to hold at least one token.
    pub fn retry_after(&self) -> Duration {
        let ms_per_token = 1000 / self.refill_rate.max(1) as u64;
        Duration::from_millis(ms_per_token.max(1))
    }
}
