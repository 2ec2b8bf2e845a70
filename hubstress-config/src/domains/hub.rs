//! Target hub configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// Configuration for the JupyterHub-style API under test
///
/// The endpoint and token may also come from the `JUPYTERHUB_ENDPOINT` and
/// `JUPYTERHUB_API_TOKEN` environment variables (see [`crate::ConfigLoader`]).
/// Presence of both is enforced just before a run starts, not at load time,
/// so that CLI flags can still fill them in.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub API base URL, e.g. `http://localhost:8000/hub/api`
    #[serde(default)]
    pub endpoint: String,

    /// Admin API token, attached to every request
    #[serde(default)]
    pub token: String,

    /// Prefix for generated usernames
    #[serde(default = "default_username_prefix")]
    pub username_prefix: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            username_prefix: default_username_prefix(),
        }
    }
}

// The token must never end up in logs, including full config dumps.
impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"***")
            .field("username_prefix", &self.username_prefix)
            .finish()
    }
}

impl HubConfig {
    /// Validate that the hub is fully specified for a networked run
    pub fn validate_for_run(&self) -> ConfigResult<()> {
        if self.token.is_empty() {
            return Err(self.validation_error(
                "An API token must be provided either using --token or the \
                 JUPYTERHUB_API_TOKEN environment variable",
            ));
        }
        if self.endpoint.is_empty() {
            return Err(self.validation_error(
                "A hub API endpoint URL must be provided either using --endpoint or the \
                 JUPYTERHUB_ENDPOINT environment variable",
            ));
        }
        validate_url(&self.endpoint, "endpoint", self.domain_name())
    }
}

impl Validatable for HubConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.username_prefix, "username_prefix", self.domain_name())?;

        // The endpoint may legitimately be absent until CLI flags are merged,
        // but if set it has to parse.
        if !self.endpoint.is_empty() {
            validate_url(&self.endpoint, "endpoint", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "hub"
    }
}

fn default_username_prefix() -> String {
    "hub-stress-test".to_string()
}
