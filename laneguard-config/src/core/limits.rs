use std::time::Duration;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::constants::limits;

/// Daily and lifetime ceilings on Mission-Scope auto-approvals.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicyLimitsConfig {
    #[serde(default = "default_daily")]
    pub daily_auto_approvals: u32,

    #[serde(default = "default_lifetime")]
    pub lifetime_auto_approvals: u64,
}

impl Default for PolicyLimitsConfig {
    fn default() -> Self {
        Self {
            daily_auto_approvals: default_daily(),
            lifetime_auto_approvals: default_lifetime(),
        }
    }
}

/// Per-path advisory lock behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LocksConfig {
    /// How long a writer waits for a busy path before failing.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Age after which a lock is presumed abandoned and may be reclaimed.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: default_acquire_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl LocksConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.acquire_timeout_ms > 0, "locks.acquire_timeout_ms must be greater than zero");
        ensure!(self.retry_interval_ms > 0, "locks.retry_interval_ms must be greater than zero");
        ensure!(self.stale_after_secs > 0, "locks.stale_after_secs must be greater than zero");
        ensure!(
            self.retry_interval_ms <= self.acquire_timeout_ms,
            "locks.retry_interval_ms cannot exceed locks.acquire_timeout_ms"
        );
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

const fn default_daily() -> u32 {
    limits::DAILY_AUTO_APPROVALS
}

const fn default_lifetime() -> u64 {
    limits::LIFETIME_AUTO_APPROVALS
}

const fn default_acquire_timeout_ms() -> u64 {
    limits::LOCK_ACQUIRE_TIMEOUT_MS
}

const fn default_retry_interval_ms() -> u64 {
    limits::LOCK_RETRY_INTERVAL_MS
}

const fn default_stale_after_secs() -> u64 {
    limits::LOCK_STALE_AFTER_SECS
}
