#![forbid(unsafe_code)]

//! Timer configuration.

use std::time::Duration;

/// Environment variable overriding [`TimerConfig::min_interval`], in milliseconds.
pub const MIN_INTERVAL_ENV: &str = "RIPPLE_TIMER_MIN_INTERVAL_MS";

/// Default floor applied to repeating timer intervals.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a [`TimerQueue`](crate::TimerQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Smallest interval a repeating timer may use. Shorter intervals are
    /// raised to this value so a zero interval cannot spin a turn forever.
    pub min_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl TimerConfig {
    /// Set the repeating-interval floor. Zero is raised to one millisecond.
    #[must_use]
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval.max(Duration::from_millis(1));
        self
    }

    /// Build a config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build a config using a custom environment lookup.
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = get_env(MIN_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config = config.with_min_interval(Duration::from_millis(ms)),
                Err(_) => {
                    tracing::warn!(
                        key = MIN_INTERVAL_ENV,
                        value = %raw,
                        "ignoring unparseable timer config value"
                    );
                }
            }
        }
        config
    }
}
