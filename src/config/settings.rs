use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub quiet_hours: QuietHoursConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Display name used as the webhook bot name
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Shared bot icon image URL
    #[serde(default)]
    pub bot_icon_url: String,
    /// Maximum number of queued messages
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum number of retained dead-letter records
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub primary: EndpointConfig,
    #[serde(default)]
    pub watchdog: EndpointConfig,
    #[serde(default)]
    pub test: EndpointConfig,
}

/// Configuration for one destination webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Webhook URL; an empty URL makes the endpoint unconfigured and
    /// messages routed to it are rejected at enqueue time
    #[serde(default)]
    pub url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Optional delivery pacing in requests per second
    #[serde(default)]
    pub rate_limit_per_sec: Option<u32>,
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retry budget after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// How long a delivered content fingerprint suppresses duplicates, in seconds
    #[serde(default = "default_dedup_ttl")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuietHoursConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Window start, "HH:MM" local time
    #[serde(default = "default_quiet_start")]
    pub start: String,
    /// Window end, "HH:MM" local time; may be earlier than start (wraps midnight)
    #[serde(default = "default_quiet_end")]
    pub end: String,
}

fn default_bot_name() -> String {
    "Feed Watchdog".to_string()
}

fn default_queue_capacity() -> usize {
    500
}

fn default_dead_letter_capacity() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000 // 1 minute
}

fn default_jitter_factor() -> f64 {
    0.1 // 10% jitter
}

fn default_dedup_ttl() -> u64 {
    600 // 10 minutes
}

fn default_quiet_start() -> String {
    "22:00".to_string()
}

fn default_quiet_end() -> String {
    "07:00".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("relay.queue_capacity", 500)?
            .set_default("relay.dead_letter_capacity", 100)?
            .set_default("retry.max_retries", 3)?
            .set_default("retry.base_delay_ms", 1_000)?
            .set_default("retry.max_delay_ms", 60_000)?
            .set_default("dedup.ttl_seconds", 600)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // ENDPOINTS_PRIMARY_URL, ENDPOINTS_WATCHDOG_URL, RETRY_MAX_RETRIES, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_request_timeout(),
            rate_limit_per_sec: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            bot_icon_url: String::new(),
            queue_capacity: default_queue_capacity(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_dedup_ttl(),
        }
    }
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_quiet_start(),
            end: default_quiet_end(),
        }
    }
}
