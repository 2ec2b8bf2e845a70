//! Hub API client implementation

use crate::errors::HttpError;
use crate::retry::RetryPolicy;
use crate::types::{ActivityPayload, ApiResponse};
use hubstress_config::domains::http::HttpConfig;
use hubstress_config::domains::hub::HubConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::{json, Value as JsonValue};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// One trait method per hub API operation
///
/// All methods return `Ok(ApiResponse)` whenever a response was obtained,
/// including non-2xx statuses and retry-exhausted 429/503/504; `Err` is
/// reserved for transport failures that outlasted the retry policy.
#[async_trait::async_trait]
pub trait HubApi: Send + Sync {
    /// GET /users
    async fn list_users(&self) -> Result<ApiResponse, HttpError>;

    /// POST /users with `{"usernames": [...]}`
    async fn create_users(&self, usernames: &[String]) -> Result<ApiResponse, HttpError>;

    /// GET /users/{name}
    async fn get_user(&self, name: &str) -> Result<ApiResponse, HttpError>;

    /// POST /users/{name}/server
    async fn start_server(&self, name: &str) -> Result<ApiResponse, HttpError>;

    /// DELETE /users/{name}/server; 204 means the server stopped synchronously
    async fn stop_server(&self, name: &str) -> Result<ApiResponse, HttpError>;

    /// DELETE /users/{name}
    async fn delete_user(&self, name: &str) -> Result<ApiResponse, HttpError>;

    /// POST /users/{name}/activity
    async fn post_activity(
        &self,
        name: &str,
        payload: &ActivityPayload,
    ) -> Result<ApiResponse, HttpError>;
}

/// Hub API client over a single shared reqwest client
///
/// The underlying connection pool is safe for concurrent use, so one
/// `HubClient` (behind an `Arc`) serves every worker in a run.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    base: String,
    retry: RetryPolicy,
    timeout: Duration,
    list_users_timeout: Duration,
    dry_run: bool,
}

/// Sleep applied to fabricated dry-run responses. Doubles as a cooperative
/// yield so tight probe loops cannot starve the runtime.
const DRY_RUN_LATENCY: Duration = Duration::from_millis(1);

impl HubClient {
    /// Create a client for the given hub
    pub fn new(hub: &HubConfig, http: &HttpConfig, dry_run: bool) -> Result<Self, HttpError> {
        let base = hub.endpoint.trim_end_matches('/').to_string();
        if base.is_empty() && !dry_run {
            return Err(HttpError::InvalidUrl("hub endpoint is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {}", hub.token))
            .map_err(|_| HttpError::Config("token contains invalid header characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(&http.user_agent)
            .default_headers(headers)
            .danger_accept_invalid_certs(!http.verify_ssl)
            .build()?;

        debug!(
            timeout = http.timeout.as_secs(),
            max_attempts = http.retry.max_attempts,
            dry_run,
            "Created hub client"
        );

        Ok(Self {
            client,
            base,
            retry: RetryPolicy::from(&http.retry),
            timeout: http.timeout,
            list_users_timeout: http.list_users_timeout,
            dry_run,
        })
    }

    /// Whether this client fabricates responses instead of doing network I/O
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Fabricate a dry-run response after a token delay
    async fn dry_response(&self, status: u16, body: JsonValue) -> Result<ApiResponse, HttpError> {
        sleep(DRY_RUN_LATENCY).await;
        Ok(ApiResponse::json(status, body))
    }

    /// Issue one request with the retry policy applied
    ///
    /// Retries cover the stress statuses (429/503/504) and connect/timeout
    /// transport errors, on any verb, up to `max_attempts` total attempts.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
        timeout: Duration,
    ) -> Result<ApiResponse, HttpError> {
        let url = format!("{}{}", self.base, path);
        let mut attempt: u32 = 1;

        loop {
            let start = Instant::now();
            let mut request = self.client.request(method.clone(), &url).timeout(timeout);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    debug!(
                        method = %method,
                        url = %url,
                        status,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        attempt,
                        "Hub API response"
                    );

                    if self.retry.is_retryable_status(status) && attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            method = %method,
                            url = %url,
                            status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Retryable status from hub, backing off"
                        );
                        sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    let success = response.status().is_success();
                    let text = response.text().await.unwrap_or_default();
                    let body = if text.is_empty() {
                        JsonValue::Null
                    } else {
                        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
                    };
                    return Ok(ApiResponse {
                        success,
                        status,
                        body,
                    });
                }
                Err(err) => {
                    if (err.is_connect() || err.is_timeout()) && attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            method = %method,
                            url = %url,
                            error = %err,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Transport error from hub, backing off"
                        );
                        sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(HttpError::Network(err));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl HubApi for HubClient {
    async fn list_users(&self) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(200, json!([])).await;
        }
        self.request(Method::GET, "/users", None, self.list_users_timeout)
            .await
    }

    async fn create_users(&self, usernames: &[String]) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(201, JsonValue::Null).await;
        }
        // POST /users is synchronous server-side; creation cost scales with
        // batch size, so the timeout must be at least one second per name.
        let timeout = Duration::from_secs(usernames.len() as u64).max(self.timeout);
        let body = json!({ "usernames": usernames });
        self.request(Method::POST, "/users", Some(&body), timeout)
            .await
    }

    async fn get_user(&self, name: &str) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self
                .dry_response(
                    200,
                    json!({
                        "name": name,
                        "servers": {"": {"ready": true, "pending": null}}
                    }),
                )
                .await;
        }
        self.request(Method::GET, &format!("/users/{}", name), None, self.timeout)
            .await
    }

    async fn start_server(&self, name: &str) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(202, JsonValue::Null).await;
        }
        self.request(
            Method::POST,
            &format!("/users/{}/server", name),
            None,
            self.timeout,
        )
        .await
    }

    async fn stop_server(&self, name: &str) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(204, JsonValue::Null).await;
        }
        self.request(
            Method::DELETE,
            &format!("/users/{}/server", name),
            None,
            self.timeout,
        )
        .await
    }

    async fn delete_user(&self, name: &str) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(204, JsonValue::Null).await;
        }
        self.request(
            Method::DELETE,
            &format!("/users/{}", name),
            None,
            self.timeout,
        )
        .await
    }

    async fn post_activity(
        &self,
        name: &str,
        payload: &ActivityPayload,
    ) -> Result<ApiResponse, HttpError> {
        if self.dry_run {
            return self.dry_response(200, JsonValue::Null).await;
        }
        let body = serde_json::to_value(payload)?;
        self.request(
            Method::POST,
            &format!("/users/{}/activity", name),
            Some(&body),
            self.timeout,
        )
        .await
    }
}
