//! Stop/delete orchestration: stop servers, confirm stopped, delete users

use crate::poll::{poll_until, server_stopped, PollOutcome};
use hubstress_config::StressConfig;
use hubstress_http::HubApi;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of one stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// 204: the server stopped synchronously, no polling needed
    Stopped,
    /// Other 2xx: the stop is in flight, poll to confirm
    Stopping,
    /// The stop request itself failed; the user is never waited on
    RequestFailed,
}

/// Outcome of the stop+wait half of the teardown pipeline, per user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Confirmed stopped (synchronously or after polling)
    Confirmed,
    /// The stop was accepted but never confirmed within the poll budget
    TimedOut,
    /// The stop request failed outright
    StopFailed,
}

/// Concurrently issue stop requests for all users, bounded by `batch_size`
///
/// The hub's slow_stop_timeout can make stops somewhat synchronous, which
/// is why this fans out instead of iterating. The returned outcomes are an
/// immutable stage result; the wait stage derives its own structure from
/// them rather than mutating shared state.
pub async fn stop_servers(
    client: &Arc<dyn HubApi>,
    usernames: &[String],
    batch_size: usize,
) -> Vec<(String, StopOutcome)> {
    let start = Instant::now();
    debug!(
        users = usernames.len(),
        batch_size, "Stopping servers in batches"
    );

    let semaphore = Arc::new(Semaphore::new(batch_size.max(1)));
    let mut pool = JoinSet::new();
    for name in usernames {
        let client = Arc::clone(client);
        let semaphore = Arc::clone(&semaphore);
        let name = name.clone();
        pool.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = match client.stop_server(&name).await {
                Ok(resp) if resp.status == 204 => StopOutcome::Stopped,
                Ok(resp) if resp.success => StopOutcome::Stopping,
                Ok(resp) => {
                    warn!(
                        username = %name,
                        status = resp.status,
                        body = %resp.body,
                        "Failed to stop server for user"
                    );
                    StopOutcome::RequestFailed
                }
                Err(err) => {
                    warn!(username = %name, error = %err, "Failed to stop server for user");
                    StopOutcome::RequestFailed
                }
            };
            (name, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(usernames.len());
    while let Some(result) = pool.join_next().await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => warn!(error = %err, "Stop worker panicked"),
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished issuing stop requests"
    );
    outcomes
}

/// Poll users whose stop was accepted until their server is confirmed gone
///
/// Users whose stop request failed are carried through as `StopFailed` and
/// never polled. With a long list, the servers at the end are usually
/// already stopped by the time the loop reaches them.
pub async fn wait_for_servers_to_stop(
    client: &Arc<dyn HubApi>,
    outcomes: Vec<(String, StopOutcome)>,
    stress: &StressConfig,
) -> Vec<(String, TeardownOutcome)> {
    let start = Instant::now();
    debug!("Waiting for servers to stop");

    let mut confirmed = Vec::with_capacity(outcomes.len());
    for (name, stop) in outcomes {
        let outcome = match stop {
            StopOutcome::Stopped => TeardownOutcome::Confirmed,
            StopOutcome::RequestFailed => TeardownOutcome::StopFailed,
            StopOutcome::Stopping => {
                match poll_until(
                    &**client,
                    &name,
                    server_stopped,
                    stress.lifecycle_timeout,
                    stress.poll_interval,
                )
                .await
                {
                    PollOutcome::Terminal => TeardownOutcome::Confirmed,
                    PollOutcome::Failed | PollOutcome::TimedOut => TeardownOutcome::TimedOut,
                }
            }
        };
        confirmed.push((name, outcome));
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished waiting for servers to stop"
    );
    confirmed
}

/// Delete every user, regardless of its stop outcome
///
/// 404 counts as success (already gone). Other failures are logged together
/// with the recorded stop outcome, flip the aggregate result to false, and
/// never short-circuit the pass.
pub async fn delete_users_after_stopping(
    client: &Arc<dyn HubApi>,
    outcomes: &[(String, TeardownOutcome)],
) -> bool {
    let start = Instant::now();
    debug!("Deleting users now that servers are stopped");

    let mut success = true;
    for (name, outcome) in outcomes {
        match client.delete_user(name).await {
            Ok(resp) if resp.success => {
                debug!(username = %name, "Deleted user");
            }
            Ok(resp) if resp.status == 404 => {
                debug!(username = %name, "User already deleted");
            }
            Ok(resp) => {
                warn!(
                    username = %name,
                    status = resp.status,
                    body = %resp.body,
                    stop_outcome = ?outcome,
                    "Failed to delete user"
                );
                success = false;
            }
            Err(err) => {
                warn!(
                    username = %name,
                    error = %err,
                    stop_outcome = ?outcome,
                    "Failed to delete user"
                );
                success = false;
            }
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished deleting users"
    );
    success
}

/// Full teardown pipeline: stop, confirm stopped, delete
///
/// Returns true iff every user was fully deleted; always a best-effort
/// complete pass over the whole list.
pub async fn teardown(
    client: &Arc<dyn HubApi>,
    usernames: &[String],
    batch_size: usize,
    stress: &StressConfig,
) -> bool {
    let stopped = stop_servers(client, usernames, batch_size).await;
    let confirmed = wait_for_servers_to_stop(client, stopped, stress).await;
    delete_users_after_stopping(client, &confirmed).await
}
