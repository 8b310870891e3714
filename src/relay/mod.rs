//! The relay service: public producer API and lifecycle.
//!
//! A [`RelayService`] owns all mutable state (queue, dedup cache,
//! statistics, dead letters) and a single background delivery worker.
//! Producers call [`enqueue`](RelayService::enqueue) concurrently; the call
//! validates, deduplicates, and inserts, and never performs network I/O.

mod backoff;
mod dead_letter;
mod quiet;
mod worker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::ConfigError;
use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Settings;
use crate::dedup::DedupCache;
use crate::error::EnqueueError;
use crate::message::{Category, Message, MessageDraft, Priority};
use crate::metrics;
use crate::queue::PriorityQueue;
use crate::ratelimit::TokenBucket;
use crate::routing::{EndpointName, EndpointTable};
use crate::stats::{RelayStats, StatisticsSnapshot};
use crate::transport::WebhookTransport;

pub use backoff::RetryPolicy;
pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use quiet::QuietHours;

/// Result of a successful `enqueue` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message was admitted to the queue.
    Accepted { id: Uuid },
    /// Logically identical content was already accepted within the dedup
    /// TTL; nothing was queued. Not a failure.
    Duplicate,
    /// A non-critical message arrived inside the quiet-hours window.
    Suppressed,
}

/// Point-in-time view of the queue and worker.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub depth: usize,
    /// Messages being delivered or waiting on a retry timer
    pub in_flight: usize,
    pub is_running: bool,
    pub accepting: bool,
    pub dead_letters: usize,
    pub dedup_entries: usize,
}

/// Summary of an undelivered message surfaced by `shutdown`.
#[derive(Debug, Clone, Serialize)]
pub struct AbandonedMessage {
    pub id: Uuid,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
}

/// What `shutdown` accomplished within its deadline.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Messages resolved (delivered or dead-lettered) during the drain
    pub drained: usize,
    /// Messages still undelivered when the deadline hit
    pub remaining: usize,
    /// The undelivered messages that were still queued, in dequeue order
    pub abandoned: Vec<AbandonedMessage>,
}

pub(crate) struct Inner {
    pub(crate) bot_name: String,
    pub(crate) bot_icon_url: String,
    pub(crate) endpoints: EndpointTable,
    pub(crate) queue: PriorityQueue,
    pub(crate) dedup: DedupCache,
    pub(crate) stats: RelayStats,
    pub(crate) dead_letters: DeadLetterStore,
    pub(crate) retry: RetryPolicy,
    pub(crate) quiet: QuietHours,
    pub(crate) buckets: HashMap<EndpointName, TokenBucket>,
    pub(crate) transport: Arc<dyn WebhookTransport>,
    pub(crate) notify: Notify,
    pub(crate) accepting: AtomicBool,
    pub(crate) running: AtomicBool,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) shutdown_tx: broadcast::Sender<()>,
}

impl Inner {
    pub(crate) fn begin_flight(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        metrics::IN_FLIGHT.inc();
    }

    pub(crate) fn end_flight(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        metrics::IN_FLIGHT.dec();
    }
}

pub struct RelayService {
    inner: Arc<Inner>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RelayService {
    /// Build a service from settings with an injected transport.
    ///
    /// Fails fast on invalid configuration (e.g. an unparsable quiet-hours
    /// window). Endpoints may be left unconfigured; messages routed to
    /// them are rejected per call at enqueue time.
    pub fn new(
        settings: &Settings,
        transport: Arc<dyn WebhookTransport>,
    ) -> Result<Self, ConfigError> {
        let endpoints = EndpointTable::from_config(&settings.endpoints);
        let quiet = QuietHours::from_config(&settings.quiet_hours)?;

        let mut buckets = HashMap::new();
        for name in EndpointTable::names() {
            if let Some(rate) = endpoints.get(name).rate_limit_per_sec {
                buckets.insert(name, TokenBucket::new(rate));
            }
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            inner: Arc::new(Inner {
                bot_name: settings.relay.bot_name.clone(),
                bot_icon_url: settings.relay.bot_icon_url.clone(),
                endpoints,
                queue: PriorityQueue::new(settings.relay.queue_capacity),
                dedup: DedupCache::new(Duration::from_secs(settings.dedup.ttl_seconds)),
                stats: RelayStats::default(),
                dead_letters: DeadLetterStore::new(settings.relay.dead_letter_capacity),
                retry: RetryPolicy::from_config(&settings.retry),
                quiet,
                buckets,
                transport,
                notify: Notify::new(),
                accepting: AtomicBool::new(true),
                running: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                shutdown_tx,
            }),
            worker_handle: Mutex::new(None),
        })
    }

    /// Spin up the delivery worker. Calling twice is a no-op.
    pub fn start(&self) {
        let mut handle = self.worker_handle.lock().expect("worker handle poisoned");
        if handle.is_some() {
            return;
        }
        self.inner.running.store(true, Ordering::SeqCst);
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        *handle = Some(tokio::spawn(worker::run(self.inner.clone(), shutdown_rx)));
    }

    /// Submit a message for delivery.
    ///
    /// Non-blocking: validates routing, applies quiet hours and duplicate
    /// suppression, and inserts into the bounded queue. All network I/O
    /// happens later, on the worker.
    pub fn enqueue(&self, draft: MessageDraft) -> Result<EnqueueOutcome, EnqueueError> {
        let inner = &self.inner;

        if !inner.accepting.load(Ordering::SeqCst) {
            return Err(EnqueueError::ShuttingDown);
        }

        // Misconfigured destination fails here, never at delivery time
        inner.endpoints.resolve(draft.category)?;

        // Quiet hours suppress non-critical traffic; Critical bypasses
        let priority = draft
            .priority
            .unwrap_or_else(|| draft.category.default_priority());
        if priority != Priority::Critical
            && inner.quiet.is_suppressed(chrono::Local::now().time())
        {
            inner.stats.suppressed.fetch_add(1, Ordering::Relaxed);
            metrics::SUPPRESSED_TOTAL.inc();
            tracing::debug!(
                category = %draft.category,
                "Message suppressed by quiet hours"
            );
            return Ok(EnqueueOutcome::Suppressed);
        }

        let message = Message::from_draft(draft, &inner.bot_name);

        if inner.dedup.is_duplicate(&message.dedup_hash) {
            inner.stats.total_enqueued.fetch_add(1, Ordering::Relaxed);
            inner
                .stats
                .duplicates_rejected
                .fetch_add(1, Ordering::Relaxed);
            metrics::DUPLICATES_TOTAL.inc();
            tracing::debug!(
                message_id = %message.id,
                category = %message.category,
                "Duplicate message rejected"
            );
            return Ok(EnqueueOutcome::Duplicate);
        }

        let id = message.id;
        let hash = message.dedup_hash.clone();
        let priority = message.priority;

        match inner.queue.try_push(message) {
            Ok(()) => {
                inner.dedup.record(&hash);
                inner.stats.total_enqueued.fetch_add(1, Ordering::Relaxed);
                metrics::ENQUEUED_TOTAL.inc();
                metrics::QUEUE_DEPTH.set(inner.queue.len() as i64);
                inner.notify.notify_one();

                tracing::debug!(
                    message_id = %id,
                    priority = priority.as_str(),
                    queue_depth = inner.queue.len(),
                    "Message enqueued"
                );
                Ok(EnqueueOutcome::Accepted { id })
            }
            Err(_rejected) => {
                metrics::QUEUE_FULL_TOTAL.inc();
                tracing::warn!(
                    capacity = inner.queue.capacity(),
                    "Queue full, message rejected"
                );
                Err(EnqueueError::QueueFull {
                    capacity: inner.queue.capacity(),
                })
            }
        }
    }

    pub fn queue_status(&self) -> QueueStatus {
        let inner = &self.inner;
        QueueStatus {
            depth: inner.queue.len(),
            in_flight: inner.in_flight.load(Ordering::SeqCst),
            is_running: inner.running.load(Ordering::SeqCst),
            accepting: inner.accepting.load(Ordering::SeqCst),
            dead_letters: inner.dead_letters.len(),
            dedup_entries: inner.dedup.len(),
        }
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Retained records of terminally failed messages, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.snapshot()
    }

    /// Stop accepting new messages, drain until empty or `timeout`, then
    /// stop the worker and report what was left undelivered.
    ///
    /// The call is bounded: it returns within roughly `timeout` plus one
    /// in-flight request. Undelivered messages are returned in the report,
    /// never silently discarded.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let inner = &self.inner;

        inner.accepting.store(false, Ordering::SeqCst);
        let outstanding_at_start =
            inner.queue.len() + inner.in_flight.load(Ordering::SeqCst);

        tracing::info!(
            outstanding = outstanding_at_start,
            timeout_ms = timeout.as_millis(),
            "Shutdown started, draining queue"
        );

        let drain = async {
            loop {
                if inner.queue.is_empty() && inner.in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let drained_fully = tokio::time::timeout(timeout, drain).await.is_ok();

        // Stop the worker; it re-checks the flag between messages
        inner.running.store(false, Ordering::SeqCst);
        let _ = inner.shutdown_tx.send(());
        inner.notify.notify_one();

        let handle = self.worker_handle.lock().expect("worker handle poisoned").take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(Duration::from_secs(1), &mut handle)
                .await
                .is_err()
            {
                // Still blocked on an in-flight request past the deadline
                handle.abort();
            }
        }

        let abandoned: Vec<AbandonedMessage> = inner
            .queue
            .drain()
            .into_iter()
            .map(|m| AbandonedMessage {
                id: m.id,
                category: m.category,
                priority: m.priority,
                title: m.title,
            })
            .collect();
        metrics::QUEUE_DEPTH.set(0);

        let remaining = abandoned.len() + inner.in_flight.load(Ordering::SeqCst);
        let drained = outstanding_at_start.saturating_sub(remaining);

        if drained_fully {
            tracing::info!(drained = drained, "Shutdown complete, queue drained");
        } else {
            tracing::warn!(
                drained = drained,
                remaining = remaining,
                "Shutdown deadline reached with undelivered messages"
            );
        }

        ShutdownReport {
            drained,
            remaining,
            abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, Settings};
    use crate::transport::MemoryTransport;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.endpoints.primary = EndpointConfig {
            url: "https://chat.example.com/services/primary".to_string(),
            ..Default::default()
        };
        settings.endpoints.watchdog = EndpointConfig {
            url: "https://chat.example.com/services/watchdog".to_string(),
            ..Default::default()
        };
        settings.endpoints.test = EndpointConfig {
            url: "https://chat.example.com/services/test".to_string(),
            ..Default::default()
        };
        settings
    }

    fn service(settings: &Settings) -> (RelayService, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let service = RelayService::new(settings, transport.clone()).unwrap();
        (service, transport)
    }

    #[tokio::test]
    async fn test_enqueue_accepts_then_rejects_duplicate() {
        let (service, _transport) = service(&settings());

        let first = service
            .enqueue(MessageDraft::new(Category::StatusNotice, "On time").body("all good"))
            .unwrap();
        assert!(matches!(first, EnqueueOutcome::Accepted { .. }));

        let second = service
            .enqueue(MessageDraft::new(Category::StatusNotice, "On time").body("all good"))
            .unwrap();
        assert_eq!(second, EnqueueOutcome::Duplicate);

        let stats = service.statistics();
        assert_eq!(stats.total_enqueued, 2);
        assert_eq!(stats.duplicates_rejected, 1);
    }

    #[tokio::test]
    async fn test_enqueue_unconfigured_endpoint_fails() {
        let mut settings = settings();
        settings.endpoints.watchdog.url.clear();
        let (service, _transport) = service(&settings);

        let err = service
            .enqueue(MessageDraft::new(Category::ErrorAlert, "boom"))
            .unwrap_err();
        assert_eq!(
            err,
            EnqueueError::Configuration {
                endpoint: "watchdog".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_enqueue_queue_full() {
        let mut settings = settings();
        settings.relay.queue_capacity = 2;
        let (service, _transport) = service(&settings);

        // Distinct titles so dedup does not interfere
        service
            .enqueue(MessageDraft::new(Category::Test, "one"))
            .unwrap();
        service
            .enqueue(MessageDraft::new(Category::Test, "two"))
            .unwrap();
        let err = service
            .enqueue(MessageDraft::new(Category::Test, "three"))
            .unwrap_err();
        assert_eq!(err, EnqueueError::QueueFull { capacity: 2 });
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_rejected() {
        let (service, _transport) = service(&settings());
        service.start();
        service.shutdown(Duration::from_millis(200)).await;

        let err = service
            .enqueue(MessageDraft::new(Category::Test, "late"))
            .unwrap_err();
        assert_eq!(err, EnqueueError::ShuttingDown);
    }

    #[tokio::test]
    async fn test_status_reflects_queue_before_start() {
        let (service, _transport) = service(&settings());
        service
            .enqueue(MessageDraft::new(Category::Test, "waiting"))
            .unwrap();

        let status = service.queue_status();
        assert_eq!(status.depth, 1);
        assert_eq!(status.in_flight, 0);
        assert!(!status.is_running);
        assert!(status.accepting);
        assert_eq!(status.dedup_entries, 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (service, transport) = service(&settings());
        service.start();
        service.start();

        service
            .enqueue(MessageDraft::new(Category::Test, "once"))
            .unwrap();
        let report = service.shutdown(Duration::from_secs(1)).await;
        assert_eq!(report.remaining, 0);
        assert_eq!(transport.delivery_count(), 1);
    }
}
