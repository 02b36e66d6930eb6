//! Configuration for the Warden runtime.
//!
//! # Configuration Priority
//!
//! 1. Explicit values passed by the embedding process
//! 2. Environment variables (`WARDEN_*` prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `WARDEN_DRAIN_INTERVAL_SECS` → drain_interval_secs
//! - `WARDEN_EVENT_LOG_CAPACITY` → event_log_capacity
//! - `WARDEN_SYSTEM_APPROVER` → system_approver
//! - `WARDEN_LOG_LEVEL` → log_level
//! - `WARDEN_LOG_FORMAT` → log_format

use serde::{Deserialize, Serialize};

/// Runtime configuration shared by the orchestrator and the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interval between action-drain cycles, in seconds.
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,

    /// Maximum number of events retained in the bus log.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Approver identity recorded on auto-approved actions.
    #[serde(default = "default_system_approver")]
    pub system_approver: String,

    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_drain_interval_secs() -> u64 {
    5
}

fn default_event_log_capacity() -> usize {
    1000
}

fn default_system_approver() -> String {
    "system".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval_secs(),
            event_log_capacity: default_event_log_capacity(),
            system_approver: default_system_approver(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl RuntimeConfig {
    /// Build a configuration from defaults, then apply `WARDEN_*` environment
    /// variable overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("WARDEN_DRAIN_INTERVAL_SECS") {
            config.drain_interval_secs = secs;
        }
        if let Some(capacity) = env_parse::<usize>("WARDEN_EVENT_LOG_CAPACITY") {
            config.event_log_capacity = capacity;
        }
        if let Ok(approver) = std::env::var("WARDEN_SYSTEM_APPROVER") {
            if !approver.is_empty() {
                config.system_approver = approver;
            }
        }
        if let Ok(level) = std::env::var("WARDEN_LOG_LEVEL") {
            if !level.is_empty() {
                config.log_level = level;
            }
        }
        if let Ok(format) = std::env::var("WARDEN_LOG_FORMAT") {
            if !format.is_empty() {
                config.log_format = format;
            }
        }

        config
    }

    /// Validate the configuration, returning a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.drain_interval_secs == 0 {
            problems.push("drain_interval_secs must be greater than 0".to_string());
        }
        if self.event_log_capacity == 0 {
            problems.push("event_log_capacity must be greater than 0".to_string());
        }
        if self.system_approver.is_empty() {
            problems.push("system_approver must not be empty".to_string());
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            problems.push(format!(
                "log_format must be 'pretty' or 'json', got '{}'",
                self.log_format
            ));
        }

        problems
    }
}

/// Parse an environment variable into a value, ignoring unset or malformed input.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    })
}
