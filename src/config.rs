//! Environment configuration

use crate::controller::DEFAULT_EXIT_PATTERN;
use crate::runtime::{RuntimeSettings, DEFAULT_MAX_STEPS, DEFAULT_SEND_INTERVAL};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite file for conversation state; in-memory when unset
    pub db_path: Option<PathBuf>,
    pub send_interval: Duration,
    pub exit_pattern: String,
    pub max_steps: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            send_interval: DEFAULT_SEND_INTERVAL,
            exit_pattern: DEFAULT_EXIT_PATTERN.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            db_path: lookup("FLOWLINE_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            send_interval: parse_var(&lookup, "FLOWLINE_SEND_INTERVAL_MS")
                .map_or(defaults.send_interval, Duration::from_millis),
            exit_pattern: lookup("FLOWLINE_EXIT_PATTERN").unwrap_or(defaults.exit_pattern),
            max_steps: parse_var(&lookup, "FLOWLINE_MAX_STEPS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_steps),
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            send_interval: self.send_interval,
            max_steps: self.max_steps,
        }
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}
