//! Username derivation and discovery of existing stress-test users

use crate::error::{StressError, StressResult};
use hubstress_http::HubApi;
use tracing::{debug, warn};

/// Deterministic username for the given index (1-based)
pub fn username(prefix: &str, index: usize) -> String {
    format!("{}-{}", prefix, index)
}

/// Find all existing users whose name matches the stress-test prefix
///
/// The result determines the starting index when resuming a numbered
/// sequence, and the victim list for purge. Order is as returned by the hub.
/// A 403 means the token is bad and aborts the whole run; any other non-2xx
/// is logged and treated as "none found".
pub async fn find_existing_users(client: &dyn HubApi, prefix: &str) -> StressResult<Vec<String>> {
    let resp = client.list_users().await?;

    if resp.status == 403 {
        return Err(StressError::InvalidToken);
    }
    if !resp.success {
        warn!(
            status = resp.status,
            body = %resp.body,
            "Failed to list existing users"
        );
        return Ok(Vec::new());
    }

    let users = resp.parse_users().unwrap_or_default();
    debug!("Found {} existing users in the hub", users.len());

    let names: Vec<String> = users
        .into_iter()
        .map(|user| user.name)
        .filter(|name| name.starts_with(prefix))
        .collect();
    debug!("Found {} existing {} users", names.len(), prefix);

    Ok(names)
}
