//! Batched user creation

use crate::error::{StressError, StressResult};
use crate::teardown::teardown;
use hubstress_config::StressConfig;
use hubstress_http::HubApi;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::naming::username;

/// Partition `[start_index, start_index + count)` into consecutive batches
/// of at most `batch_size` usernames
pub fn plan_batches(
    prefix: &str,
    start_index: usize,
    count: usize,
    batch_size: usize,
) -> Vec<Vec<String>> {
    let mut batches = Vec::new();
    let mut index = start_index;
    let end = start_index + count;
    while index < end {
        let len = batch_size.min(end - index);
        let batch: Vec<String> = (index..index + len)
            .map(|i| username(prefix, i))
            .collect();
        index += len;
        batches.push(batch);
    }
    batches
}

/// Create `count` users in batches, continuing the numbered sequence after
/// `existing_count` pre-existing users
///
/// Each batch is one POST /users request. A failed batch is cleaned up
/// best-effort and fails the whole creation: members of a batch exist
/// together or not at all, and no further batches are attempted.
pub async fn create_users(
    client: &Arc<dyn HubApi>,
    stress: &StressConfig,
    prefix: &str,
    count: usize,
    existing_count: usize,
) -> StressResult<Vec<Vec<String>>> {
    let start = Instant::now();
    let batch_size = stress.batch_size.min(count).max(1);
    info!(
        count,
        batch_size, "Start creating users in batches"
    );

    let batches = plan_batches(prefix, existing_count + 1, count, batch_size);
    let mut created: Vec<Vec<String>> = Vec::with_capacity(batches.len());

    for batch in batches {
        let reason = match client.create_users(&batch).await {
            Ok(resp) if resp.success => {
                debug!(usernames = ?batch, "Created users");
                created.push(batch);
                continue;
            }
            Ok(resp) => {
                error!(
                    usernames = ?batch,
                    status = resp.status,
                    body = %resp.body,
                    "Failed to create users"
                );
                format!("status {}", resp.status)
            }
            Err(err) => {
                error!(usernames = ?batch, error = %err, "Failed to create users");
                err.to_string()
            }
        };

        // Best-effort cleanup so the hub is not left with a half-created
        // batch; cleanup failures are logged, not escalated.
        if !teardown(client, &batch, batch.len(), stress).await {
            warn!(usernames = ?batch, "Failed to delete users from failed batch");
        }
        return Err(StressError::CreationFailed {
            batch,
            reason,
        });
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        batches = created.len(),
        "Finished creating users"
    );
    Ok(created)
}
