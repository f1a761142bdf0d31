//! Engine configuration.

use chrono::Duration;
use std::env;

/// Tunables of the bracket manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Extra attempts after a transient store failure during propagation
    pub propagation_retries: u32,

    /// Base backoff between propagation attempts, doubled on each retry
    pub propagation_backoff_ms: u64,

    /// Delay between a match's end and the default start of the next round
    pub next_round_delay_hours: i64,
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `PROPAGATION_RETRIES`: retry count (default: 3)
    /// - `PROPAGATION_BACKOFF_MS`: base backoff in milliseconds (default: 50)
    /// - `NEXT_ROUND_DELAY_HOURS`: next-round start offset (default: 24)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            propagation_retries: parse_or(
                &lookup,
                "PROPAGATION_RETRIES",
                defaults.propagation_retries,
            ),
            propagation_backoff_ms: parse_or(
                &lookup,
                "PROPAGATION_BACKOFF_MS",
                defaults.propagation_backoff_ms,
            ),
            next_round_delay_hours: parse_or(
                &lookup,
                "NEXT_ROUND_DELAY_HOURS",
                defaults.next_round_delay_hours,
            ),
        }
    }

    /// Offset applied to a match's end time to schedule the next round
    pub fn next_round_delay(&self) -> Duration {
        Duration::hours(self.next_round_delay_hours)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        std::time::Duration::from_millis(self.propagation_backoff_ms.saturating_mul(factor))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            propagation_retries: 3,
            propagation_backoff_ms: 50,
            next_round_delay_hours: 24,
        }
    }
}

/// Process environment as a key lookup
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Parse the value found under `key`, falling back to `default`
pub fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
