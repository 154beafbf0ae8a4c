use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ratelimit::RateLimitError;

/// Default number of requests admitted per period
pub const DEFAULT_QUOTA: usize = 100;

/// Default length of the quota period
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Default number of requests in flight at once
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Rate and concurrency ceilings of a batch.
///
/// At most `quota` requests are admitted within any window of length
/// `period`, and at most `concurrency` requests are in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of admissions per period
    #[serde(default = "default_quota")]
    pub quota: usize,

    /// Length of the rolling window the quota applies to
    #[serde(default = "default_period", with = "humantime_serde")]
    pub period: Duration,

    /// Maximum number of concurrently outstanding requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            period: default_period(),
            concurrency: default_concurrency(),
        }
    }
}

const fn default_quota() -> usize {
    DEFAULT_QUOTA
}

const fn default_period() -> Duration {
    DEFAULT_PERIOD
}

const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl RateLimitConfig {
    /// Create a `RateLimitConfig` from CLI options, using defaults for missing values
    #[must_use]
    pub fn from_options(
        quota: Option<usize>,
        period: Option<Duration>,
        concurrency: Option<usize>,
    ) -> Self {
        Self {
            quota: quota.unwrap_or(DEFAULT_QUOTA),
            period: period.unwrap_or(DEFAULT_PERIOD),
            concurrency: concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        }
    }

    /// Check the configuration and return the effective one.
    ///
    /// A concurrency limit above the quota is clamped down to the quota:
    /// requests beyond the quota would only sit waiting for the rate gate.
    ///
    /// # Errors
    ///
    /// Returns an error if the quota, the period or the concurrency is zero.
    pub fn validate(self) -> Result<Self, RateLimitError> {
        if self.quota == 0 {
            return Err(RateLimitError::ZeroQuota);
        }
        if self.period.is_zero() {
            return Err(RateLimitError::ZeroPeriod);
        }
        if self.concurrency == 0 {
            return Err(RateLimitError::ZeroConcurrency);
        }

        if self.concurrency > self.quota {
            log::warn!(
                "Concurrency ({}) must be <= quota ({}). Setting concurrency to {}.",
                self.concurrency,
                self.quota,
                self.quota
            );
        }

        Ok(Self {
            concurrency: self.effective_concurrency(),
            ..self
        })
    }

    /// The concurrency limit after clamping it to the quota
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.min(self.quota)
    }
}
