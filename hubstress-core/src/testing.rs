//! Scripted in-memory hub double for tests
//!
//! Responses are scripted FIFO per (operation, username) pair; when a script
//! runs dry the double falls back to a generic success for that operation,
//! mirroring an idle, healthy hub. Every call is recorded so tests can
//! assert on exact request counts.

use hubstress_http::{ActivityPayload, ApiResponse, HttpError, HubApi};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Scripted = Result<ApiResponse, String>;

/// Scripted [`HubApi`] double
#[derive(Default)]
pub struct ScriptedHub {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the given operation and username. Operations
    /// without a username (list_users, create_users) use an empty name.
    pub fn script(&self, op: &str, name: &str, resp: ApiResponse) {
        self.scripts
            .lock()
            .expect("scripts lock poisoned")
            .entry(key(op, name))
            .or_default()
            .push_back(Ok(resp));
    }

    /// Queue a transport error for the given operation and username
    pub fn script_err(&self, op: &str, name: &str, message: &str) {
        self.scripts
            .lock()
            .expect("scripts lock poisoned")
            .entry(key(op, name))
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// All recorded calls, as "op" or "op username" strings, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// Number of recorded calls starting with the given prefix
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    async fn take(&self, op: &str, name: &str, fallback: ApiResponse) -> Result<ApiResponse, HttpError> {
        // Token latency keeps tight probe loops from monopolizing the test
        // runtime (and from collecting millions of samples).
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(key(op, name).trim_end().to_string());

        let scripted = self
            .scripts
            .lock()
            .expect("scripts lock poisoned")
            .get_mut(&key(op, name))
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(message)) => Err(HttpError::Config(message)),
            None => Ok(fallback),
        }
    }
}

fn key(op: &str, name: &str) -> String {
    if name.is_empty() {
        op.to_string()
    } else {
        format!("{} {}", op, name)
    }
}

/// User record whose default server is ready
pub fn ready_user(name: &str) -> ApiResponse {
    ApiResponse::json(
        200,
        json!({"name": name, "servers": {"": {"ready": true, "pending": null}}}),
    )
}

/// User record with a spawn still pending
pub fn pending_user(name: &str) -> ApiResponse {
    ApiResponse::json(
        200,
        json!({"name": name, "servers": {"": {"ready": false, "pending": "spawn"}}}),
    )
}

/// User record with no servers left
pub fn stopped_user(name: &str) -> ApiResponse {
    ApiResponse::json(200, json!({"name": name, "servers": {}}))
}

#[async_trait::async_trait]
impl HubApi for ScriptedHub {
    async fn list_users(&self) -> Result<ApiResponse, HttpError> {
        self.take("list_users", "", ApiResponse::json(200, json!([])))
            .await
    }

    async fn create_users(&self, _usernames: &[String]) -> Result<ApiResponse, HttpError> {
        self.take("create_users", "", ApiResponse::empty(201)).await
    }

    async fn get_user(&self, name: &str) -> Result<ApiResponse, HttpError> {
        let fallback = ready_user(name);
        self.take("get_user", name, fallback).await
    }

    async fn start_server(&self, name: &str) -> Result<ApiResponse, HttpError> {
        self.take("start_server", name, ApiResponse::empty(202))
            .await
    }

    async fn stop_server(&self, name: &str) -> Result<ApiResponse, HttpError> {
        self.take("stop_server", name, ApiResponse::empty(204))
            .await
    }

    async fn delete_user(&self, name: &str) -> Result<ApiResponse, HttpError> {
        self.take("delete_user", name, ApiResponse::empty(204))
            .await
    }

    async fn post_activity(
        &self,
        name: &str,
        _payload: &ActivityPayload,
    ) -> Result<ApiResponse, HttpError> {
        self.take("post_activity", name, ApiResponse::empty(200))
            .await
    }
}
