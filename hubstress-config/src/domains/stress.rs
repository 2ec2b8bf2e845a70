//! Stress run configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single stress run
///
/// All fields are fixed for the duration of one invocation; nothing here
/// mutates mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Number of users/servers to create
    #[serde(default = "default_count")]
    pub count: usize,

    /// Batch size for user creation and the stop/start worker pools.
    /// z2jh deployments typically cap concurrent spawns at 64
    /// (c.JupyterHub.concurrent_spawn_limit), so keep this well below that.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of persistent workers in activity-simulation mode
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long to wait for a server start/stop to reach a terminal state.
    /// Admission control in the hub can delay spawns well beyond normal
    /// request latency.
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_lifecycle_timeout"
    )]
    pub lifecycle_timeout: Duration,

    /// Sleep between lifecycle poll iterations
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            batch_size: default_batch_size(),
            workers: default_workers(),
            lifecycle_timeout: default_lifecycle_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl StressConfig {
    /// Effective batch size: a batch never exceeds the requested count
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.min(self.count)
    }
}

impl Validatable for StressConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.count, "count", self.domain_name())?;
        validate_positive(self.batch_size, "batch_size", self.domain_name())?;
        validate_positive(self.workers, "workers", self.domain_name())?;
        validate_positive(
            self.lifecycle_timeout.as_secs(),
            "lifecycle_timeout",
            self.domain_name(),
        )?;
        validate_positive(
            self.poll_interval.as_millis(),
            "poll_interval",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "stress"
    }
}

// Default value functions
fn default_count() -> usize {
    100
}

fn default_batch_size() -> usize {
    10
}

fn default_workers() -> usize {
    10
}

fn default_lifecycle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}
