//! Start orchestration: issue start requests per batch, then poll to readiness

use crate::poll::{poll_until, server_ready, PollOutcome};
use hubstress_config::StressConfig;
use hubstress_http::HubApi;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Issue one start request per username, batch by batch
///
/// Within a batch the requests go out concurrently (the pool is exactly as
/// wide as the batch); across batches the previous pool drains first, which
/// bounds simultaneous in-flight starts to one batch's width. A failed start
/// is logged and does not abort the run: the user simply fails or times out
/// in the readiness pass. No compensating delete of the orphaned user is
/// attempted.
pub async fn start_servers(client: &Arc<dyn HubApi>, users: &[Vec<String>]) {
    let start = Instant::now();
    info!("Starting notebook servers");

    for usernames in users {
        let mut pool = JoinSet::new();
        for name in usernames {
            let client = Arc::clone(client);
            let name = name.clone();
            pool.spawn(async move {
                match client.start_server(&name).await {
                    Ok(resp) if resp.success => {
                        debug!(username = %name, "Server is starting");
                    }
                    Ok(resp) => {
                        error!(
                            username = %name,
                            status = resp.status,
                            body = %resp.body,
                            "Failed to start server for user"
                        );
                    }
                    Err(err) => {
                        error!(username = %name, error = %err, "Failed to start server for user");
                    }
                }
            });
        }
        while let Some(result) = pool.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "Start worker panicked");
            }
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished dispatching start requests"
    );
}

/// Poll every started user to readiness
///
/// Polling is per-identifier and independent: a slow server early in the
/// list never delays the verdict on a fast one later in the list. The pool
/// is bounded by the configured batch size. The pass itself never fails the
/// run; per-user outcomes are logged.
pub async fn wait_for_servers_to_start(
    client: &Arc<dyn HubApi>,
    users: &[Vec<String>],
    stress: &StressConfig,
) {
    let start = Instant::now();
    info!("Waiting for notebook servers to be ready");

    let width = stress.effective_batch_size().max(1);
    let semaphore = Arc::new(Semaphore::new(width));
    let mut pool = JoinSet::new();

    for name in users.iter().flatten() {
        let client = Arc::clone(client);
        let semaphore = Arc::clone(&semaphore);
        let name = name.clone();
        let timeout = stress.lifecycle_timeout;
        let interval = stress.poll_interval;
        pool.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            match poll_until(&*client, &name, server_ready, timeout, interval).await {
                PollOutcome::Terminal => {
                    debug!(username = %name, "Server is ready");
                }
                PollOutcome::Failed => {
                    error!(
                        username = %name,
                        "Server failed to start; check the hub logs for details"
                    );
                }
                PollOutcome::TimedOut => {
                    error!(
                        username = %name,
                        timeout_secs = timeout.as_secs(),
                        "Timed out waiting for server to be ready"
                    );
                }
            }
        });
    }

    while let Some(result) = pool.join_next().await {
        if let Err(err) = result {
            warn!(error = %err, "Readiness poll worker panicked");
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished waiting for servers to start"
    );
}
