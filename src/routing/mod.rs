//! Category-to-endpoint routing.
//!
//! The destination set is small and fixed: the primary alerts channel, the
//! watchdog-only channel, and the test channel. Routing is a closed,
//! exhaustive match so an unmapped category cannot exist at runtime; the
//! only runtime failure mode is an endpoint left unconfigured, and that is
//! reported at enqueue time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EndpointsConfig;
use crate::error::EnqueueError;
use crate::message::Category;

/// The fixed set of destination channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointName {
    /// Main alerts channel for feed notifications
    Primary,
    /// Watchdog-only channel for supervisor errors and health reports
    Watchdog,
    /// Test channel
    Test,
}

impl EndpointName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointName::Primary => "primary",
            EndpointName::Watchdog => "watchdog",
            EndpointName::Test => "test",
        }
    }
}

impl std::fmt::Display for EndpointName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel a category belongs to.
pub fn route(category: Category) -> EndpointName {
    match category {
        Category::ComparisonAlert
        | Category::DelayAlert
        | Category::DailyReport
        | Category::StatusNotice
        | Category::NoData => EndpointName::Primary,
        Category::ErrorAlert | Category::StatusReport => EndpointName::Watchdog,
        Category::Test => EndpointName::Test,
    }
}

/// One destination webhook.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub name: EndpointName,
    pub url: String,
    pub timeout: Duration,
    /// Optional delivery pacing in requests per second
    pub rate_limit_per_sec: Option<u32>,
}

impl Endpoint {
    fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Resolved endpoint table, built once from settings.
#[derive(Debug, Clone)]
pub struct EndpointTable {
    primary: Endpoint,
    watchdog: Endpoint,
    test: Endpoint,
}

impl EndpointTable {
    pub fn from_config(config: &EndpointsConfig) -> Self {
        let build = |name: EndpointName, cfg: &crate::config::EndpointConfig| Endpoint {
            name,
            url: cfg.url.clone(),
            timeout: cfg.timeout(),
            rate_limit_per_sec: cfg.rate_limit_per_sec,
        };
        Self {
            primary: build(EndpointName::Primary, &config.primary),
            watchdog: build(EndpointName::Watchdog, &config.watchdog),
            test: build(EndpointName::Test, &config.test),
        }
    }

    pub fn get(&self, name: EndpointName) -> &Endpoint {
        match name {
            EndpointName::Primary => &self.primary,
            EndpointName::Watchdog => &self.watchdog,
            EndpointName::Test => &self.test,
        }
    }

    /// Resolve a category to its configured endpoint.
    ///
    /// An endpoint with no URL fails here, at enqueue time, so a
    /// misconfiguration never reaches the delivery worker.
    pub fn resolve(&self, category: Category) -> Result<&Endpoint, EnqueueError> {
        let endpoint = self.get(route(category));
        if !endpoint.is_configured() {
            return Err(EnqueueError::Configuration {
                endpoint: endpoint.name.as_str().to_string(),
            });
        }
        Ok(endpoint)
    }

    pub fn names() -> [EndpointName; 3] {
        [EndpointName::Primary, EndpointName::Watchdog, EndpointName::Test]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn table() -> EndpointTable {
        EndpointTable::from_config(&EndpointsConfig {
            primary: EndpointConfig {
                url: "https://chat.example.com/services/primary".to_string(),
                ..Default::default()
            },
            watchdog: EndpointConfig {
                url: "https://chat.example.com/services/watchdog".to_string(),
                ..Default::default()
            },
            test: EndpointConfig::default(),
        })
    }

    #[test]
    fn test_watchdog_categories_route_to_watchdog() {
        assert_eq!(route(Category::ErrorAlert), EndpointName::Watchdog);
        assert_eq!(route(Category::StatusReport), EndpointName::Watchdog);
    }

    #[test]
    fn test_news_categories_route_to_primary() {
        for category in [
            Category::ComparisonAlert,
            Category::DelayAlert,
            Category::DailyReport,
            Category::StatusNotice,
            Category::NoData,
        ] {
            assert_eq!(route(category), EndpointName::Primary);
        }
    }

    #[test]
    fn test_resolve_returns_configured_endpoint() {
        let table = table();
        let endpoint = table.resolve(Category::ErrorAlert).unwrap();
        assert_eq!(endpoint.name, EndpointName::Watchdog);
        assert!(endpoint.url.ends_with("/watchdog"));
    }

    #[test]
    fn test_resolve_unconfigured_endpoint_fails() {
        let table = table();
        let err = table.resolve(Category::Test).unwrap_err();
        assert_eq!(
            err,
            EnqueueError::Configuration {
                endpoint: "test".to_string()
            }
        );
    }

    #[test]
    fn test_default_timeout_applied() {
        let table = table();
        let endpoint = table.get(EndpointName::Primary);
        assert_eq!(endpoint.timeout, Duration::from_secs(10));
    }
}
