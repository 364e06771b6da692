use chrono::{DateTime, NaiveDate, Utc};
use laneguard_config::PolicyLimitsConfig;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

/// Counters behind a [`AutoApproveQuota`], keyed by UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub day: NaiveDate,
    pub daily_used: u32,
    pub lifetime_used: u64,
}

/// In-memory daily and lifetime ceiling on auto-approved local writes.
#[derive(Debug)]
pub struct AutoApproveQuota {
    daily_limit: u32,
    lifetime_limit: u64,
    usage: Mutex<QuotaUsage>,
}

impl AutoApproveQuota {
    pub fn new(limits: &PolicyLimitsConfig) -> Self {
        Self::with_limits(limits.daily_auto_approvals, limits.lifetime_auto_approvals)
    }

    pub fn with_limits(daily_limit: u32, lifetime_limit: u64) -> Self {
        Self {
            daily_limit,
            lifetime_limit,
            usage: Mutex::new(QuotaUsage {
                day: Utc::now().date_naive(),
                daily_used: 0,
                lifetime_used: 0,
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::with_limits(u32::MAX, u64::MAX)
    }

    /// Take one unit. `false` means either ceiling is reached and nothing
    /// was consumed.
    pub fn try_consume(&self) -> bool {
        self.try_consume_at(Utc::now())
    }

    pub fn try_consume_at(&self, now: DateTime<Utc>) -> bool {
        let mut usage = self.usage.lock();
        let today = now.date_naive();
        if usage.day != today {
            debug!(previous = %usage.day, %today, "auto-approve daily counter reset");
            usage.day = today;
            usage.daily_used = 0;
        }
        if usage.daily_used >= self.daily_limit || usage.lifetime_used >= self.lifetime_limit {
            warn!(
                daily_used = usage.daily_used,
                daily_limit = self.daily_limit,
                lifetime_used = usage.lifetime_used,
                lifetime_limit = self.lifetime_limit,
                "auto-approve quota exhausted"
            );
            return false;
        }
        usage.daily_used += 1;
        usage.lifetime_used += 1;
        true
    }

    pub fn usage(&self) -> QuotaUsage {
        *self.usage.lock()
    }
}
