//! Top-level runs: stress test, purge, activity simulation

use crate::activity::{simulate_activity, ActivityReport};
use crate::batch::create_users;
use crate::error::{StressError, StressResult};
use crate::naming::find_existing_users;
use crate::start::{start_servers, wait_for_servers_to_start};
use crate::teardown::teardown;
use hubstress_config::StressConfig;
use hubstress_http::HubApi;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Scale up: create users in batches, start their servers, wait for
/// readiness, and (unless `keep`) tear everything down again
pub async fn run_stress_test(
    client: Arc<dyn HubApi>,
    stress: &StressConfig,
    prefix: &str,
    keep: bool,
) -> StressResult<()> {
    let start = Instant::now();

    // Existing stress-test users determine the starting index for names.
    let existing = find_existing_users(&*client, prefix).await?;
    let users = create_users(&client, stress, prefix, stress.count, existing.len()).await?;

    start_servers(&client, &users).await;
    // The hub's concurrent_spawn_limit (and a cluster auto-scaler adding
    // nodes) can make this take a while.
    wait_for_servers_to_start(&client, &users, stress).await;

    if !keep {
        let usernames: Vec<String> = users.into_iter().flatten().collect();
        info!(count = usernames.len(), "Deleting users");
        if !teardown(&client, &usernames, stress.effective_batch_size(), stress).await {
            return Err(StressError::TeardownIncomplete);
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished stress test run"
    );
    Ok(())
}

/// Delete every user matching the stress-test prefix
pub async fn purge(
    client: Arc<dyn HubApi>,
    stress: &StressConfig,
    prefix: &str,
) -> StressResult<()> {
    let start = Instant::now();

    let usernames = find_existing_users(&*client, prefix).await?;
    if usernames.is_empty() {
        info!(prefix, "No users found to purge");
        return Ok(());
    }

    info!(count = usernames.len(), "Deleting users");
    if !teardown(&client, &usernames, stress.batch_size, stress).await {
        return Err(StressError::TeardownIncomplete);
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished purge"
    );
    Ok(())
}

/// Simulate activity over `count` users, creating any that are missing, and
/// (unless `keep`) tear the used set down afterwards
pub async fn run_activity(
    client: Arc<dyn HubApi>,
    stress: &StressConfig,
    prefix: &str,
    keep: bool,
    dry_run: bool,
) -> StressResult<ActivityReport> {
    let start = Instant::now();

    let mut usernames = find_existing_users(&*client, prefix).await?;
    if usernames.len() < stress.count {
        let missing = stress.count - usernames.len();
        info!(
            existing = usernames.len(),
            missing, "Creating additional users for activity simulation"
        );
        let created = create_users(&client, stress, prefix, missing, usernames.len()).await?;
        usernames.extend(created.into_iter().flatten());
    }
    usernames.truncate(stress.count);

    let report = simulate_activity(Arc::clone(&client), &usernames, stress.workers, dry_run).await;

    if !keep {
        info!(count = usernames.len(), "Deleting users");
        if !teardown(&client, &usernames, stress.effective_batch_size(), stress).await {
            return Err(StressError::TeardownIncomplete);
        }
    }

    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished activity run"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHub;
    use hubstress_http::ApiResponse;
    use serde_json::json;

    fn stress(count: usize, batch_size: usize) -> StressConfig {
        StressConfig {
            count,
            batch_size,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_and_teardown() {
        let hub = Arc::new(ScriptedHub::new());
        let client: Arc<dyn HubApi> = hub.clone();

        run_stress_test(client, &stress(5, 2), "hub-stress-test", false)
            .await
            .unwrap();

        // ceil(5/2) = 3 creation batches; every user started, polled ready,
        // stopped, and deleted.
        assert_eq!(hub.count_calls("create_users"), 3);
        assert_eq!(hub.count_calls("start_server"), 5);
        assert_eq!(hub.count_calls("stop_server"), 5);
        assert_eq!(hub.count_calls("delete_user"), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_keep_skips_teardown() {
        let hub = Arc::new(ScriptedHub::new());
        let client: Arc<dyn HubApi> = hub.clone();

        run_stress_test(client, &stress(3, 3), "hub-stress-test", true)
            .await
            .unwrap();

        assert_eq!(hub.count_calls("start_server"), 3);
        assert_eq!(hub.count_calls("stop_server"), 0);
        assert_eq!(hub.count_calls("delete_user"), 0);
    }

    #[tokio::test]
    async fn test_purge_deletes_discovered_users() {
        let hub = Arc::new(ScriptedHub::new());
        hub.script(
            "list_users",
            "",
            ApiResponse::json(
                200,
                json!([
                    {"name": "hub-stress-test-1", "servers": {}},
                    {"name": "alice", "servers": {}},
                ]),
            ),
        );
        let client: Arc<dyn HubApi> = hub.clone();

        purge(client, &StressConfig::default(), "hub-stress-test")
            .await
            .unwrap();

        assert_eq!(hub.count_calls("delete_user hub-stress-test-1"), 1);
        assert_eq!(hub.count_calls("delete_user alice"), 0);
    }

    #[tokio::test]
    async fn test_purge_with_nothing_to_do() {
        let hub = Arc::new(ScriptedHub::new());
        hub.script("list_users", "", ApiResponse::json(200, json!([])));
        let client: Arc<dyn HubApi> = hub.clone();

        purge(client, &StressConfig::default(), "hub-stress-test")
            .await
            .unwrap();
        assert_eq!(hub.count_calls("delete_user"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_activity_creates_missing_users() {
        let hub = Arc::new(ScriptedHub::new());
        hub.script(
            "list_users",
            "",
            ApiResponse::json(
                200,
                json!([{"name": "hub-stress-test-1", "servers": {}}]),
            ),
        );
        let client: Arc<dyn HubApi> = hub.clone();

        let report = run_activity(client, &stress(3, 10), "hub-stress-test", true, false)
            .await
            .unwrap();

        // One existed, two were created to reach the requested count.
        assert_eq!(hub.count_calls("create_users"), 1);
        assert_eq!(report.activity.unwrap().count, 3);
        assert_eq!(hub.count_calls("post_activity hub-stress-test-2"), 1);
        assert_eq!(hub.count_calls("post_activity hub-stress-test-3"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_activity_teardown_when_not_keeping() {
        let hub = Arc::new(ScriptedHub::new());
        let client: Arc<dyn HubApi> = hub.clone();

        run_activity(client, &stress(2, 10), "hub-stress-test", false, false)
            .await
            .unwrap();

        assert_eq!(hub.count_calls("delete_user"), 2);
    }

    #[tokio::test]
    async fn test_invalid_token_aborts_before_any_mutation() {
        let hub = Arc::new(ScriptedHub::new());
        hub.script("list_users", "", ApiResponse::empty(403));
        let client: Arc<dyn HubApi> = hub.clone();

        let result = run_stress_test(client, &stress(5, 2), "hub-stress-test", false).await;
        assert!(matches!(result, Err(StressError::InvalidToken)));
        assert_eq!(hub.count_calls("create_users"), 0);
    }
}
