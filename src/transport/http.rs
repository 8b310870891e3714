//! Real HTTP transport built on reqwest.

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::routing::Endpoint;

use super::{WebhookPayload, WebhookTransport};

/// Upper bound on how much of an error response body is kept for logging.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
        })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn deliver(
        &self,
        endpoint: &Endpoint,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&endpoint.url)
            .json(payload)
            .timeout(endpoint.timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(&e))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                endpoint = %endpoint.name,
                status = status.as_u16(),
                "Webhook delivered"
            );
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        body.truncate(MAX_ERROR_BODY);
        let reason = format!("HTTP {}: {}", status.as_u16(), body);

        // Rate limiting and server-side failures are worth retrying;
        // any other client error is not.
        if status.as_u16() == 429 || status.is_server_error() {
            Err(DeliveryError::Transient {
                status: Some(status.as_u16()),
                reason,
            })
        } else {
            Err(DeliveryError::Permanent {
                status: status.as_u16(),
                reason,
            })
        }
    }
}

fn classify_request_error(error: &reqwest::Error) -> DeliveryError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        format!("request failed: {}", error)
    };
    // Everything that never produced a response is treated as transient
    DeliveryError::Transient {
        status: None,
        reason,
    }
}
