//! Message model: categories, priorities, and the immutable delivery unit.
//!
//! A [`MessageDraft`] is what producers hand to the relay; the relay turns
//! it into a [`Message`] at enqueue time, assigning the id, timestamp, and
//! the content fingerprint used for duplicate suppression.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Alert categories. Each category routes to exactly one endpoint and
/// carries a default priority and accent color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Business-day comparison analysis
    ComparisonAlert,
    /// Feed item published late
    DelayAlert,
    /// Daily integrated report
    DailyReport,
    /// Feed item published on time
    StatusNotice,
    /// No data refresh observed
    NoData,
    /// Watchdog-detected failure
    ErrorAlert,
    /// Watchdog health report
    StatusReport,
    /// Connectivity test message
    Test,
}

impl Category {
    /// Stable wire name, also used in the dedup fingerprint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ComparisonAlert => "comparison-alert",
            Category::DelayAlert => "delay-alert",
            Category::DailyReport => "daily-report",
            Category::StatusNotice => "status-notice",
            Category::NoData => "no-data",
            Category::ErrorAlert => "error-alert",
            Category::StatusReport => "status-report",
            Category::Test => "test",
        }
    }

    /// Priority assigned when the producer does not specify one.
    pub fn default_priority(&self) -> Priority {
        match self {
            Category::ErrorAlert => Priority::Critical,
            Category::DelayAlert => Priority::High,
            Category::NoData | Category::Test => Priority::Low,
            Category::ComparisonAlert
            | Category::DailyReport
            | Category::StatusNotice
            | Category::StatusReport => Priority::Normal,
        }
    }

    /// Accent color used when the producer does not specify one.
    pub fn default_color(&self) -> &'static str {
        match self {
            Category::ErrorAlert => "#dc3545",
            Category::StatusNotice | Category::StatusReport => "#28a745",
            Category::Test => "#6c757d",
            Category::ComparisonAlert | Category::DailyReport => "#007bff",
            Category::DelayAlert => "#ffc107",
            Category::NoData => "#6c757d",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency levels with a strict total order. Smaller sorts first, so
/// `Critical` is always dequeued ahead of everything else.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    /// System failures, immediate delivery required
    Critical,
    /// Delayed publications, important state changes
    High,
    /// Routine notifications (default)
    #[default]
    Normal,
    /// Tests and informational messages
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// What a producer submits. Unset fields fall back to per-category
/// defaults (priority, color) or service configuration (sender name).
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub category: Category,
    pub title: String,
    pub body: String,
    pub color: Option<String>,
    pub priority: Option<Priority>,
    pub sender_name: Option<String>,
    pub test_mode: bool,
}

impl MessageDraft {
    pub fn new(category: Category, title: impl Into<String>) -> Self {
        Self {
            category,
            title: title.into(),
            body: String::new(),
            color: None,
            priority: None,
            sender_name: None,
            test_mode: false,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn sender(mut self, sender_name: impl Into<String>) -> Self {
        self.sender_name = Some(sender_name.into());
        self
    }

    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

/// One notification attempt, owned by the queue until dequeued and by the
/// delivery worker while in flight.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Unique id, generated at enqueue time
    pub id: Uuid,
    pub category: Category,
    pub priority: Priority,
    pub sender_name: String,
    pub title: String,
    pub body: String,
    /// Hex accent color for the attachment
    pub color: String,
    /// Content fingerprint, computed once at creation and never changed
    /// across retries of the same message
    pub dedup_hash: String,
    pub created_at: DateTime<Utc>,
    /// Completed delivery attempts; only ever increases
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Dry-run flag: the message flows through the full pipeline but the
    /// network call is skipped
    pub test_mode: bool,
}

impl Message {
    /// Materialize a draft, filling category defaults and assigning
    /// identity. The fingerprint is fixed here for the message's lifetime.
    pub(crate) fn from_draft(draft: MessageDraft, default_sender: &str) -> Self {
        let priority = draft
            .priority
            .unwrap_or_else(|| draft.category.default_priority());
        let color = draft
            .color
            .unwrap_or_else(|| draft.category.default_color().to_string());
        let sender_name = draft
            .sender_name
            .unwrap_or_else(|| default_sender.to_string());
        let dedup_hash = fingerprint(draft.category, &draft.title, &draft.body);

        Self {
            id: Uuid::new_v4(),
            category: draft.category,
            priority,
            sender_name,
            title: draft.title,
            body: draft.body,
            color,
            dedup_hash,
            created_at: Utc::now(),
            attempt_count: 0,
            last_error: None,
            test_mode: draft.test_mode,
        }
    }

    pub(crate) fn record_attempt(&mut self, error: Option<String>) {
        self.attempt_count += 1;
        if error.is_some() {
            self.last_error = error;
        }
    }
}

/// Stable fingerprint of a message's category and content.
///
/// Title and body are whitespace-normalized so trivial formatting
/// differences do not defeat duplicate suppression.
pub fn fingerprint(category: Category, title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize(body).as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[test]
    fn test_category_default_priority() {
        assert_eq!(Category::ErrorAlert.default_priority(), Priority::Critical);
        assert_eq!(Category::DelayAlert.default_priority(), Priority::High);
        assert_eq!(Category::StatusNotice.default_priority(), Priority::Normal);
        assert_eq!(Category::Test.default_priority(), Priority::Low);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(Category::ErrorAlert.as_str(), "error-alert");
        assert_eq!(
            serde_json::to_string(&Category::ComparisonAlert).unwrap(),
            "\"comparison-alert\""
        );
        let parsed: Category = serde_json::from_str("\"status-report\"").unwrap();
        assert_eq!(parsed, Category::StatusReport);
    }

    #[test]
    fn test_fingerprint_stable_and_normalized() {
        let a = fingerprint(Category::ErrorAlert, "Disk  full", "host db-1\nis down");
        let b = fingerprint(Category::ErrorAlert, " Disk full ", "host db-1 is down");
        assert_eq!(a, b);

        // Different category means different fingerprint even for identical content
        let c = fingerprint(Category::StatusReport, "Disk full", "host db-1 is down");
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_draft_fills_defaults() {
        let draft = MessageDraft::new(Category::ErrorAlert, "Process died").body("watchdog lost it");
        let msg = Message::from_draft(draft, "Feed Watchdog");

        assert_eq!(msg.priority, Priority::Critical);
        assert_eq!(msg.color, "#dc3545");
        assert_eq!(msg.sender_name, "Feed Watchdog");
        assert_eq!(msg.attempt_count, 0);
        assert!(msg.last_error.is_none());
        assert!(!msg.test_mode);
    }

    #[test]
    fn test_from_draft_respects_overrides() {
        let draft = MessageDraft::new(Category::StatusNotice, "On time")
            .priority(Priority::Low)
            .color("#123456")
            .sender("Newsroom Monitor")
            .test_mode(true);
        let msg = Message::from_draft(draft, "Feed Watchdog");

        assert_eq!(msg.priority, Priority::Low);
        assert_eq!(msg.color, "#123456");
        assert_eq!(msg.sender_name, "Newsroom Monitor");
        assert!(msg.test_mode);
    }

    #[test]
    fn test_record_attempt_monotone() {
        let draft = MessageDraft::new(Category::Test, "ping");
        let mut msg = Message::from_draft(draft, "bot");
        let hash_before = msg.dedup_hash.clone();

        msg.record_attempt(Some("HTTP 500".to_string()));
        msg.record_attempt(None);

        assert_eq!(msg.attempt_count, 2);
        assert_eq!(msg.last_error.as_deref(), Some("HTTP 500"));
        // Fingerprint never changes across retries
        assert_eq!(msg.dedup_hash, hash_before);
    }
}
