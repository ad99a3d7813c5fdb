//! Tunables for the session lifecycle state machine.
//! Defaults match the shipped web client; every knob can also be set from
//! the environment so deployments can tighten or relax the timers without
//! a rebuild.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry policy for profile resolution.
/// Attempts are strictly sequential; the delay after attempt `n` grows
/// linearly (1x, 2x, 3x the base unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after the given attempt number (1-based) fails.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms * u64::from(attempt))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the proactive session refresh loop.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Upper bound on how long the initial check may hold the UI in a
    /// loading state before the phase is forced to ready.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

const fn default_keep_alive_secs() -> u64 {
    600
}

const fn default_ready_timeout_ms() -> u64 {
    5_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive_secs(),
            ready_timeout_ms: default_ready_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Defaults overridden by `ATELIER_*` environment variables.
    /// Unparseable values fall back to the default rather than erroring,
    /// so a bad deployment env cannot keep the tab from starting.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_u64("ATELIER_KEEPALIVE_SECS") {
            cfg.keep_alive_secs = v;
        }
        if let Some(v) = env_u64("ATELIER_READY_TIMEOUT_MS") {
            cfg.ready_timeout_ms = v;
        }
        if let Some(v) = env_u64("ATELIER_RETRY_BASE_MS") {
            cfg.retry.base_delay_ms = v;
        }
        if let Some(v) = env_u64("ATELIER_RETRY_MAX_ATTEMPTS") {
            cfg.retry.max_attempts = v as u32;
        }
        cfg
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<u64>().ok())
}
