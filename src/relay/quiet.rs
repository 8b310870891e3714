//! Quiet-hours window.
//!
//! A pure function of configuration and the supplied wall-clock time; the
//! caller decides what to do with a suppressed message (the relay rejects
//! it at enqueue time) and is responsible for the Critical-priority bypass.

use chrono::NaiveTime;
use config::ConfigError;

use crate::config::QuietHoursConfig;

#[derive(Debug, Clone)]
pub struct QuietHours {
    enabled: bool,
    start: NaiveTime,
    end: NaiveTime,
}

impl QuietHours {
    pub fn from_config(config: &QuietHoursConfig) -> Result<Self, ConfigError> {
        let start = parse_hhmm(&config.start)?;
        let end = parse_hhmm(&config.end)?;
        Ok(Self {
            enabled: config.enabled,
            start,
            end,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }

    /// Whether the given time falls inside the quiet window.
    ///
    /// A window whose end is earlier than its start wraps midnight
    /// (22:00–07:00 covers late evening and early morning). A zero-length
    /// window never suppresses.
    pub fn is_suppressed(&self, now: NaiveTime) -> bool {
        if !self.enabled || self.start == self.end {
            return false;
        }
        if self.start < self.end {
            self.start <= now && now < self.end
        } else {
            now >= self.start || now < self.end
        }
    }
}

fn parse_hhmm(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        ConfigError::Message(format!(
            "invalid quiet-hours time '{}', expected HH:MM",
            value
        ))
    })
}
