use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alert_relay::config::Settings;
use alert_relay::message::{Category, MessageDraft};
use alert_relay::relay::RelayService;
use alert_relay::transport::HttpTransport;

/// Smoke check: enqueue one test message, wait for the queue to drain,
/// print the relay's view of what happened.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    let transport = Arc::new(HttpTransport::new()?);
    let service = RelayService::new(&settings, transport)?;
    service.start();
    tracing::info!("Relay service started");

    let body = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "webhook connectivity test".to_string());
    let outcome = service.enqueue(
        MessageDraft::new(Category::Test, "Relay connectivity test").body(body),
    )?;
    tracing::info!(outcome = ?outcome, "Test message enqueued");

    let report = service.shutdown(Duration::from_secs(15)).await;
    if report.remaining > 0 {
        tracing::warn!(
            remaining = report.remaining,
            "Test message was not delivered before the deadline"
        );
    }

    println!(
        "queue status: {}",
        serde_json::to_string_pretty(&service.queue_status())?
    );
    println!(
        "statistics: {}",
        serde_json::to_string_pretty(&service.statistics())?
    );

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
