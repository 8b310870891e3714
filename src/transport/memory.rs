//! In-memory recording transport.
//!
//! Stands in for [`HttpTransport`](super::HttpTransport) in tests: records
//! every delivery attempt and can be scripted to fail a fixed number of
//! times, fail forever, or take a fixed amount of time per delivery.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::routing::{Endpoint, EndpointName};

use super::{WebhookPayload, WebhookTransport};

/// One observed delivery attempt.
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub endpoint: EndpointName,
    pub url: String,
    pub payload: WebhookPayload,
}

enum Behavior {
    AlwaysOk,
    AlwaysFail(DeliveryError),
    /// Fail this many times, then succeed
    FailTimes { remaining: u32, error: DeliveryError },
}

pub struct MemoryTransport {
    deliveries: Mutex<Vec<RecordedDelivery>>,
    behavior: Mutex<Behavior>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    /// A transport where every delivery succeeds instantly.
    pub fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            behavior: Mutex::new(Behavior::AlwaysOk),
            latency: None,
        }
    }

    /// Every delivery fails with the given error.
    pub fn failing(error: DeliveryError) -> Self {
        let transport = Self::new();
        *transport.behavior.lock().unwrap() = Behavior::AlwaysFail(error);
        transport
    }

    /// The first `times` deliveries fail with the given error, the rest succeed.
    pub fn failing_times(times: u32, error: DeliveryError) -> Self {
        let transport = Self::new();
        *transport.behavior.lock().unwrap() = Behavior::FailTimes {
            remaining: times,
            error,
        };
        transport
    }

    /// Each delivery takes at least this long.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// All attempts observed so far, including failed ones.
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    fn next_result(&self) -> Result<(), DeliveryError> {
        let mut behavior = self.behavior.lock().unwrap();
        match &mut *behavior {
            Behavior::AlwaysOk => Ok(()),
            Behavior::AlwaysFail(error) => Err(error.clone()),
            Behavior::FailTimes { remaining, error } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(error.clone())
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for MemoryTransport {
    async fn deliver(
        &self,
        endpoint: &Endpoint,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.deliveries.lock().unwrap().push(RecordedDelivery {
            endpoint: endpoint.name,
            url: endpoint.url.clone(),
            payload: payload.clone(),
        });
        self.next_result()
    }
}
