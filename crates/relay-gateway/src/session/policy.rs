//! Connection policy

use relay_common::SessionConfig;
use std::time::Duration;

/// Capped exponential backoff for transient reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Reconnects attempted before the session gives up
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect number `attempt` (0-based): `min(base * 2^attempt, cap)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Whether another reconnect is allowed after `attempts` have been made
    #[must_use]
    pub const fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Everything a session needs to know about timing and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub reconnect: ReconnectPolicy,
    /// Sends are rejected for this long after the socket opens
    pub grace_period: Duration,
    pub watchdog_interval: Duration,
    /// Sends allowed per 60 second window
    pub rate_limit_per_minute: u32,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            reconnect: ReconnectPolicy {
                base: Duration::from_millis(config.reconnect_base_ms),
                cap: Duration::from_millis(config.reconnect_cap_ms),
                max_attempts: config.reconnect_max_attempts,
            },
            grace_period: Duration::from_millis(config.grace_period_ms),
            watchdog_interval: Duration::from_secs(config.watchdog_interval_secs),
            rate_limit_per_minute: config.rate_limit_per_minute,
        }
    }
}
