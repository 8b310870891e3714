//! The delivery worker: the single consumer of the priority queue.
//!
//! Per-message state machine:
//! `Queued -> Sending -> { Success | RetryScheduled -> Queued | DeadLettered }`
//!
//! The worker never sleeps on a retry: rescheduling spawns a timer task
//! that re-inserts the message, leaving the loop free to service
//! higher-priority arrivals in the meantime.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::message::Message;
use crate::metrics;
use crate::routing::route;
use crate::transport::WebhookPayload;

use super::dead_letter::DeadLetter;
use super::Inner;

pub(super) async fn run(inner: Arc<Inner>, mut shutdown_rx: broadcast::Receiver<()>) {
    tracing::info!("Delivery worker started");

    loop {
        // Drain everything ready, highest urgency first. The stop flag is
        // re-checked between messages so shutdown is not held hostage by a
        // deep queue.
        while inner.running.load(Ordering::SeqCst) {
            let Some(message) = inner.queue.pop() else {
                break;
            };
            metrics::QUEUE_DEPTH.set(inner.queue.len() as i64);
            inner.begin_flight();
            deliver(&inner, message).await;
        }

        if !inner.running.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = inner.notify.notified() => {}
        }
    }

    tracing::info!("Delivery worker stopped");
}

/// One trip through the state machine for a dequeued message.
async fn deliver(inner: &Arc<Inner>, mut message: Message) {
    let endpoint = inner.endpoints.get(route(message.category));

    // Endpoint pacing: an empty bucket defers the message without
    // consuming a retry attempt.
    if let Some(bucket) = inner.buckets.get(&endpoint.name) {
        if !bucket.try_consume() {
            let delay = bucket.retry_after();
            tracing::debug!(
                message_id = %message.id,
                endpoint = %endpoint.name,
                delay_ms = delay.as_millis(),
                "Endpoint rate limit reached, delivery deferred"
            );
            schedule_requeue(inner, message, delay);
            return;
        }
    }

    let started = Instant::now();
    let result = if message.test_mode {
        tracing::info!(
            message_id = %message.id,
            endpoint = %endpoint.name,
            "Dry run, network call skipped"
        );
        Ok(())
    } else {
        let payload = WebhookPayload::from_message(&message, &inner.bot_icon_url);
        inner.transport.deliver(endpoint, &payload).await
    };
    let elapsed = started.elapsed();

    inner.stats.total_sent.fetch_add(1, Ordering::Relaxed);

    match result {
        Ok(()) => {
            message.record_attempt(None);
            inner.stats.successful.fetch_add(1, Ordering::Relaxed);
            inner.stats.mark_sent_now();
            if !message.test_mode {
                inner.stats.record_response_time(elapsed);
                metrics::RESPONSE_SECONDS.observe(elapsed.as_secs_f64());
            }
            metrics::ATTEMPTS_TOTAL
                .with_label_values(&[metrics::outcome::SUCCESS])
                .inc();

            tracing::info!(
                message_id = %message.id,
                endpoint = %endpoint.name,
                attempt = message.attempt_count,
                elapsed_ms = elapsed.as_millis(),
                "Message delivered"
            );
            inner.end_flight();
        }
        Err(error) => {
            message.record_attempt(Some(error.to_string()));

            if error.is_transient() {
                metrics::ATTEMPTS_TOTAL
                    .with_label_values(&[metrics::outcome::TRANSIENT])
                    .inc();

                if !inner.retry.should_give_up(message.attempt_count) {
                    let delay = inner.retry.next_delay(message.attempt_count);
                    inner.stats.retry_attempts.fetch_add(1, Ordering::Relaxed);
                    metrics::RETRIES_TOTAL.inc();

                    tracing::warn!(
                        message_id = %message.id,
                        endpoint = %endpoint.name,
                        attempt = message.attempt_count,
                        max_retries = inner.retry.max_retries(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Transient delivery failure, retry scheduled"
                    );
                    schedule_requeue(inner, message, delay);
                    return;
                }

                dead_letter(inner, message, "retry budget exhausted");
            } else {
                metrics::ATTEMPTS_TOTAL
                    .with_label_values(&[metrics::outcome::PERMANENT])
                    .inc();
                dead_letter(inner, message, "permanent failure");
            }
            inner.end_flight();
        }
    }
}

/// Re-insert a message after a delay. The message stays accounted as
/// in-flight for the whole wait so the shutdown drain cannot miss it.
fn schedule_requeue(inner: &Arc<Inner>, message: Message, delay: Duration) {
    let inner = inner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        if inner.running.load(Ordering::SeqCst) {
            inner.queue.requeue(message);
            metrics::QUEUE_DEPTH.set(inner.queue.len() as i64);
            inner.end_flight();
            inner.notify.notify_one();
        } else {
            // The service stopped while this retry was pending; surface the
            // message instead of dropping it on the floor.
            tracing::warn!(
                message_id = %message.id,
                attempt = message.attempt_count,
                "Service stopped before retry fired, message dead-lettered"
            );
            inner
                .dead_letters
                .push(DeadLetter::from_message(&message, "shutdown before retry"));
            inner.stats.failed.fetch_add(1, Ordering::Relaxed);
            metrics::DEAD_LETTER_TOTAL.inc();
            inner.end_flight();
        }
    });
}

fn dead_letter(inner: &Arc<Inner>, message: Message, reason: &str) {
    tracing::error!(
        message_id = %message.id,
        category = %message.category,
        attempts = message.attempt_count,
        last_error = message.last_error.as_deref().unwrap_or(""),
        reason = reason,
        "Message dead-lettered"
    );
    inner
        .dead_letters
        .push(DeadLetter::from_message(&message, reason));
    inner.stats.failed.fetch_add(1, Ordering::Relaxed);
    metrics::DEAD_LETTER_TOTAL.inc();
}
