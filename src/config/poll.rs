// src/config/poll.rs
use std::time::Duration;

use crate::ingest::providers::meetup::DEFAULT_API_BASE;

pub const ENV_POLL_INTERVAL_SECS: &str = "MEETUP_POLL_INTERVAL_SECS";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "MEETUP_FETCH_TIMEOUT_SECS";
pub const ENV_API_BASE: &str = "MEETUP_API_BASE";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Poll loop and fetcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Upper bound for one upstream request.
    pub fetch_timeout: Duration,
    pub api_base: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl PollConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Read settings from the environment. Missing, unparsable or zero values
    /// fall back to defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        let api_base = std::env::var(ENV_API_BASE)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.api_base);
        Self {
            interval: secs_from_env(ENV_POLL_INTERVAL_SECS).unwrap_or(d.interval),
            fetch_timeout: secs_from_env(ENV_FETCH_TIMEOUT_SECS).unwrap_or(d.fetch_timeout),
            api_base,
        }
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_secs(n)),
        _ => {
            tracing::warn!(var = name, value = %raw, "invalid duration, using default");
            None
        }
    }
}
