//! Wire types for the hub API

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Outcome of one hub API call that produced a response
///
/// "Success" is a named branch rather than an overloaded truth test:
/// callers match on `success`/`status` explicitly.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Whether the status was 2xx
    pub success: bool,

    /// HTTP status code
    pub status: u16,

    /// Response body parsed as JSON, or a JSON string of the raw text
    pub body: JsonValue,
}

impl ApiResponse {
    /// Build a response from a status and JSON body
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self {
            success: (200..300).contains(&status),
            status,
            body,
        }
    }

    /// Build a bodyless response
    pub fn empty(status: u16) -> Self {
        Self::json(status, JsonValue::Null)
    }

    /// Parse the body as a user record
    pub fn parse_user(&self) -> Option<UserRecord> {
        serde_json::from_value(self.body.clone()).ok()
    }

    /// Parse the body as a list of user records
    pub fn parse_users(&self) -> Option<Vec<UserRecord>> {
        serde_json::from_value(self.body.clone()).ok()
    }
}

/// A hub user record, as returned by GET /users/{name}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,

    /// Servers keyed by server name. Named servers are not used, so the
    /// only key that ever appears is "" (the default server).
    #[serde(default)]
    pub servers: HashMap<String, ServerRecord>,
}

impl UserRecord {
    /// The user's default (unnamed) server, if any
    pub fn default_server(&self) -> Option<&ServerRecord> {
        self.servers.get("")
    }

    /// Whether the user has any server entry at all
    pub fn has_servers(&self) -> bool {
        !self.servers.is_empty()
    }
}

/// State of one server within a user record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerRecord {
    /// True once the server is up and routable
    #[serde(default)]
    pub ready: bool,

    /// Pending action ("spawn", "stop"), absent when nothing is in flight
    #[serde(default)]
    pub pending: Option<String>,
}

impl ServerRecord {
    /// Whether a spawn/stop is still in flight
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Body for POST /users/{name}/activity
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPayload {
    pub last_activity: String,
    pub servers: HashMap<String, ServerActivity>,
}

/// Per-server activity timestamp
#[derive(Debug, Clone, Serialize)]
pub struct ServerActivity {
    pub last_activity: String,
}

impl ActivityPayload {
    /// Payload stamping last activity one minute in the future, so the
    /// hub's idle culler keeps its hands off the server during a run.
    pub fn upcoming() -> Self {
        let stamp = (Utc::now() + chrono::Duration::seconds(60))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut servers = HashMap::new();
        servers.insert(
            String::new(),
            ServerActivity {
                last_activity: stamp.clone(),
            },
        );
        Self {
            last_activity: stamp,
            servers,
        }
    }
}
