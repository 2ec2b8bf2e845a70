//! Retry policy for requests against a hub under stress

use hubstress_config::domains::http::RetryConfig;
use std::time::Duration;

/// Statuses worth retrying during a stress run:
/// 429 from concurrent_spawn_limit, 503 if the hub container crashes,
/// 504 if an upstream gateway times out.
pub const RETRY_STATUSES: [u16; 3] = [429, 503, 504];

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Base delay; doubles each attempt
    pub backoff_factor: Duration,

    /// Upper bound on a single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_factor: config.backoff_factor,
            max_backoff: config.max_backoff,
        }
    }
}

impl RetryPolicy {
    /// Whether the given status should be retried
    pub fn is_retryable_status(&self, status: u16) -> bool {
        RETRY_STATUSES.contains(&status)
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_factor.saturating_mul(1u32 << exp);
        delay.min(self.max_backoff)
    }
}
