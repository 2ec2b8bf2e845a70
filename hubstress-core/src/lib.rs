//! Core orchestration logic for hubstress
//!
//! This crate holds the parts with real coordination in them: batching math,
//! bounded-concurrency fan-out, poll-until-terminal loops, failure-triggered
//! rollback, and the activity-simulation workload. The HTTP transport and
//! configuration live in their own crates and are treated as collaborators.

pub mod activity;
pub mod batch;
pub mod error;
pub mod naming;
pub mod poll;
pub mod run;
pub mod start;
pub mod teardown;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use activity::{simulate_activity, ActivityReport, TimingStats, DRY_RUN_SAMPLE};
pub use batch::{create_users, plan_batches};
pub use error::{StressError, StressResult};
pub use naming::{find_existing_users, username};
pub use poll::{poll_until, server_ready, server_stopped, PollOutcome, PollVerdict};
pub use run::{purge, run_activity, run_stress_test};
pub use start::{start_servers, wait_for_servers_to_start};
pub use teardown::{stop_servers, teardown, StopOutcome, TeardownOutcome};
