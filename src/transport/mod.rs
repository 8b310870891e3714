//! Outbound webhook transport.
//!
//! The delivery worker talks to a [`WebhookTransport`] trait object, never
//! to an HTTP client directly. Production uses [`HttpTransport`]; tests
//! inject [`MemoryTransport`], which records every delivery and can be
//! scripted to fail.

mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::message::Message;
use crate::routing::Endpoint;

pub use http::HttpTransport;
pub use memory::{MemoryTransport, RecordedDelivery};

/// Wire payload for the chat webhook.
///
/// Field names are part of the webhook contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub bot_name: String,
    pub bot_icon_image: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: String,
    pub text: String,
}

impl WebhookPayload {
    pub fn from_message(message: &Message, bot_icon_url: &str) -> Self {
        Self {
            bot_name: message.sender_name.clone(),
            bot_icon_image: bot_icon_url.to_string(),
            text: message.title.clone(),
            attachments: vec![Attachment {
                color: message.color.clone(),
                text: message.body.clone(),
            }],
        }
    }
}

/// A destination that can accept one webhook payload.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(
        &self,
        endpoint: &Endpoint,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Category, MessageDraft};

    #[test]
    fn test_payload_wire_format() {
        let message = Message::from_draft(
            MessageDraft::new(Category::ErrorAlert, "Process died")
                .body("watchdog lost contact")
                .color("#dc3545")
                .sender("Feed Watchdog"),
            "unused-default",
        );
        let payload = WebhookPayload::from_message(&message, "https://img.example.com/bot.png");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "botName": "Feed Watchdog",
                "botIconImage": "https://img.example.com/bot.png",
                "text": "Process died",
                "attachments": [
                    { "color": "#dc3545", "text": "watchdog lost contact" }
                ]
            })
        );
    }

    #[test]
    fn test_payload_round_trip() {
        let raw = r##"{"botName":"n","botIconImage":"i","text":"t","attachments":[{"color":"#fff","text":"b"}]}"##;
        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.bot_name, "n");
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].color, "#fff");
    }
}
