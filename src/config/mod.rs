mod settings;

pub use settings::{
    DedupConfig, EndpointConfig, EndpointsConfig, QuietHoursConfig, RelayConfig, RetryConfig,
    Settings,
};
