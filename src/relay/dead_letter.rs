//! Dead-letter store: terminally failed messages, retained for visibility.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::message::{Category, Message};

/// Record of a message that exhausted its retry budget or hit a permanent
/// failure. The payload body is dropped; what remains is enough for an
/// operator to identify and re-trigger the alert.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub message_id: Uuid,
    pub category: Category,
    pub title: String,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn from_message(message: &Message, reason: &str) -> Self {
        Self {
            message_id: message.id,
            category: message.category,
            title: message.title.clone(),
            attempts: message.attempt_count,
            last_error: message
                .last_error
                .clone()
                .unwrap_or_else(|| reason.to_string()),
            failed_at: Utc::now(),
        }
    }
}

/// Bounded ring of dead letters; when full, the oldest record is evicted.
pub struct DeadLetterStore {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetterStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, letter: DeadLetter) {
        let mut entries = self.entries.lock().expect("dead-letter mutex poisoned");
        if entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::warn!(
                    message_id = %evicted.message_id,
                    "Dead-letter store full, evicted oldest record"
                );
            }
        }
        entries.push_back(letter);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead-letter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all retained records, oldest first.
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .expect("dead-letter mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageDraft;

    fn letter(title: &str) -> DeadLetter {
        let mut message =
            Message::from_draft(MessageDraft::new(Category::ErrorAlert, title), "bot");
        message.record_attempt(Some("HTTP 500".to_string()));
        DeadLetter::from_message(&message, "unused")
    }

    #[test]
    fn test_push_and_snapshot() {
        let store = DeadLetterStore::new(10);
        store.push(letter("a"));
        store.push(letter("b"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].title, "a");
        assert_eq!(snapshot[0].attempts, 1);
        assert_eq!(snapshot[0].last_error, "HTTP 500");
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let store = DeadLetterStore::new(2);
        store.push(letter("a"));
        store.push(letter("b"));
        store.push(letter("c"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].title, "b");
        assert_eq!(snapshot[1].title, "c");
    }

    #[test]
    fn test_fallback_reason_when_no_attempt_error() {
        let message = Message::from_draft(MessageDraft::new(Category::Test, "t"), "bot");
        let letter = DeadLetter::from_message(&message, "shutdown before retry");
        assert_eq!(letter.last_error, "shutdown before retry");
    }
}
