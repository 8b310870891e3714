use thiserror::Error;

/// Errors a producer can see from [`enqueue`](crate::relay::RelayService::enqueue).
///
/// Duplicate and quiet-hours rejections are *not* errors; they are normal
/// outcomes reported through [`EnqueueOutcome`](crate::relay::EnqueueOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// The service stopped accepting new messages (shutdown in progress).
    #[error("relay is shutting down, no longer accepting messages")]
    ShuttingDown,

    /// The bounded queue is at capacity and the backpressure policy is reject.
    #[error("delivery queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The message's category routes to an endpoint with no webhook URL
    /// configured. Surfaced at enqueue time, never at delivery time.
    #[error("no webhook URL configured for endpoint '{endpoint}'")]
    Configuration { endpoint: String },
}

/// Delivery-time failures, handled entirely inside the worker.
///
/// The transient/permanent split drives the retry decision: transient
/// failures go back through the backoff policy, permanent ones are
/// dead-lettered immediately.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// Timeout, connection failure, HTTP 5xx, or HTTP 429.
    #[error("transient delivery failure: {reason}")]
    Transient { status: Option<u16>, reason: String },

    /// HTTP 4xx other than 429. Retrying cannot help.
    #[error("permanent delivery failure (HTTP {status}): {reason}")]
    Permanent { status: u16, reason: String },
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient { .. })
    }

    /// HTTP status associated with the failure, if the server responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Transient { status, .. } => *status,
            DeliveryError::Permanent { status, .. } => Some(*status),
        }
    }
}
