//! Poll-until-terminal loops for asynchronous server-state transitions

use hubstress_http::{ApiResponse, HubApi};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// What a predicate saw in one poll response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// The desired terminal state was reached
    Terminal,
    /// The state machine died server-side; further polling is wasted
    Failed,
    /// Not there yet, keep polling
    NotYet,
}

/// How a poll loop ended
///
/// `TimedOut` is a value, not an error: callers decide whether an
/// exhausted poll budget is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Terminal,
    Failed,
    TimedOut,
}

/// Repeatedly GET the user's record until `check` reports a terminal state
/// or the timeout budget is spent
///
/// One GET per iteration with `interval` sleeps in between; the loop runs
/// exactly `timeout / interval` iterations. A transport error on one
/// iteration is logged and treated as "not yet terminal": the operation is
/// resilient to single flaky reads.
pub async fn poll_until<F>(
    client: &dyn HubApi,
    username: &str,
    check: F,
    timeout: Duration,
    interval: Duration,
) -> PollOutcome
where
    F: Fn(&ApiResponse) -> PollVerdict,
{
    let attempts = (timeout.as_millis() / interval.as_millis().max(1)).max(1) as u64;

    for attempt in 1..=attempts {
        match client.get_user(username).await {
            Ok(resp) => match check(&resp) {
                PollVerdict::Terminal => {
                    debug!(username, attempt, "Reached terminal state");
                    return PollOutcome::Terminal;
                }
                PollVerdict::Failed => {
                    error!(
                        username,
                        attempt,
                        body = %resp.body,
                        "Server-side failure, giving up on polling"
                    );
                    return PollOutcome::Failed;
                }
                PollVerdict::NotYet if resp.success => {
                    debug!(username, attempt, "Still waiting");
                }
                PollVerdict::NotYet => {
                    warn!(
                        username,
                        attempt,
                        status = resp.status,
                        body = %resp.body,
                        "Failed to get user while polling"
                    );
                }
            },
            Err(err) => {
                warn!(username, attempt, error = %err, "Transient error while polling");
            }
        }
        if attempt < attempts {
            sleep(interval).await;
        }
    }

    warn!(
        username,
        timeout_secs = timeout.as_secs(),
        "Timed out waiting for terminal state"
    );
    PollOutcome::TimedOut
}

/// Terminal when the user's default server reports `ready`; failed when the
/// server has neither `ready` nor `pending` set, which means the spawn died
/// server-side
pub fn server_ready(resp: &ApiResponse) -> PollVerdict {
    if !resp.success {
        return PollVerdict::NotYet;
    }
    let Some(user) = resp.parse_user() else {
        return PollVerdict::NotYet;
    };
    match user.default_server() {
        Some(server) if server.ready => PollVerdict::Terminal,
        Some(server) if server.is_pending() => PollVerdict::NotYet,
        _ => PollVerdict::Failed,
    }
}

/// Terminal when the user has no server entries left, or the user itself is
/// gone (a concurrently deleted user trivially has no running server)
pub fn server_stopped(resp: &ApiResponse) -> PollVerdict {
    if resp.status == 404 {
        return PollVerdict::Terminal;
    }
    if !resp.success {
        return PollVerdict::NotYet;
    }
    match resp.parse_user() {
        Some(user) if !user.has_servers() => PollVerdict::Terminal,
        _ => PollVerdict::NotYet,
    }
}
