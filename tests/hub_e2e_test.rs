//! End-to-end tests driving the real hub client and orchestrators against
//! an in-process stub hub.
//!
//! The stub keeps an in-memory user map; servers become ready (or stopped)
//! after a configurable number of GETs, and a configurable number of 429s
//! can be injected on creation to exercise the client's retry policy.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hubstress_config::{HttpConfig, HubConfig, StressConfig};
use hubstress_core::{
    purge, run_activity, run_stress_test, simulate_activity, StressError,
};
use hubstress_http::{HttpError, HubApi, HubClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN: &str = "e2e-test-token";

#[derive(Debug, Clone)]
enum StubServer {
    Starting { polls_left: usize },
    Ready,
    Stopping { polls_left: usize },
}

#[derive(Debug, Default, Clone)]
struct StubUser {
    server: Option<StubServer>,
}

#[derive(Clone)]
struct StubHub {
    users: Arc<Mutex<HashMap<String, StubUser>>>,
    /// GETs before a starting server reports ready
    ready_after: usize,
    /// GETs before a stopping server disappears; 0 makes stops synchronous
    stop_after: usize,
    /// Number of POST /users calls to answer with 429 before succeeding
    reject_creates: Arc<AtomicUsize>,
}

impl StubHub {
    fn new(ready_after: usize, stop_after: usize) -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            ready_after,
            stop_after,
            reject_creates: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn seed(&self, name: &str) {
        self.users
            .lock()
            .unwrap()
            .insert(name.to_string(), StubUser::default());
    }

    fn user_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn render(&self, name: &str, user: &StubUser) -> Value {
        let servers = match &user.server {
            None => json!({}),
            Some(StubServer::Ready) => json!({"": {"ready": true, "pending": null}}),
            Some(StubServer::Starting { .. }) => {
                json!({"": {"ready": false, "pending": "spawn"}})
            }
            Some(StubServer::Stopping { .. }) => {
                json!({"": {"ready": false, "pending": "stop"}})
            }
        };
        json!({"name": name, "servers": servers})
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("token {}", TOKEN))
        .unwrap_or(false)
}

async fn list_users(State(hub): State<StubHub>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({"status": 403}))).into_response();
    }
    let users = hub.users.lock().unwrap();
    let listing: Vec<Value> = users.iter().map(|(name, user)| hub.render(name, user)).collect();
    Json(listing).into_response()
}

async fn create_users(State(hub): State<StubHub>, Json(body): Json<Value>) -> impl IntoResponse {
    if hub
        .reject_creates
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }
    let names: Vec<String> = body["usernames"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let mut users = hub.users.lock().unwrap();
    for name in names {
        users.insert(name, StubUser::default());
    }
    StatusCode::CREATED.into_response()
}

async fn get_user(State(hub): State<StubHub>, Path(name): Path<String>) -> impl IntoResponse {
    let mut users = hub.users.lock().unwrap();
    let Some(user) = users.get_mut(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    // Advance the server state machine one step per observation.
    match user.server.take() {
        Some(StubServer::Starting { polls_left }) if polls_left == 0 => {
            user.server = Some(StubServer::Ready);
        }
        Some(StubServer::Starting { polls_left }) => {
            user.server = Some(StubServer::Starting {
                polls_left: polls_left - 1,
            });
        }
        Some(StubServer::Stopping { polls_left }) if polls_left == 0 => {
            user.server = None;
        }
        Some(StubServer::Stopping { polls_left }) => {
            user.server = Some(StubServer::Stopping {
                polls_left: polls_left - 1,
            });
        }
        other => user.server = other,
    }

    let rendered = hub.render(&name, user);
    Json(rendered).into_response()
}

async fn start_server(State(hub): State<StubHub>, Path(name): Path<String>) -> impl IntoResponse {
    let mut users = hub.users.lock().unwrap();
    let Some(user) = users.get_mut(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    user.server = Some(StubServer::Starting {
        polls_left: hub.ready_after,
    });
    StatusCode::ACCEPTED.into_response()
}

async fn stop_server(State(hub): State<StubHub>, Path(name): Path<String>) -> impl IntoResponse {
    let mut users = hub.users.lock().unwrap();
    let Some(user) = users.get_mut(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if hub.stop_after == 0 {
        user.server = None;
        StatusCode::NO_CONTENT.into_response()
    } else {
        user.server = Some(StubServer::Stopping {
            polls_left: hub.stop_after,
        });
        StatusCode::ACCEPTED.into_response()
    }
}

async fn delete_user(State(hub): State<StubHub>, Path(name): Path<String>) -> impl IntoResponse {
    if hub.users.lock().unwrap().remove(&name).is_some() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn post_activity(State(hub): State<StubHub>, Path(name): Path<String>) -> impl IntoResponse {
    if hub.users.lock().unwrap().contains_key(&name) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serve the stub on a loopback port and return the hub API base URL
async fn spawn_hub(hub: StubHub) -> String {
    let app = Router::new()
        .route("/hub/api/users", get(list_users).post(create_users))
        .route("/hub/api/users/{name}", get(get_user).delete(delete_user))
        .route(
            "/hub/api/users/{name}/server",
            post(start_server).delete(stop_server),
        )
        .route("/hub/api/users/{name}/activity", post(post_activity))
        .with_state(hub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/hub/api", addr)
}

fn client_for(endpoint: &str, token: &str) -> Arc<dyn HubApi> {
    let hub = HubConfig {
        endpoint: endpoint.to_string(),
        token: token.to_string(),
        username_prefix: "hub-stress-test".to_string(),
    };
    let mut http = HttpConfig::default();
    http.retry.max_attempts = 5;
    http.retry.backoff_factor = Duration::from_millis(10);
    Arc::new(HubClient::new(&hub, &http, false).unwrap())
}

fn fast_stress(count: usize, batch_size: usize, workers: usize) -> StressConfig {
    StressConfig {
        count,
        batch_size,
        workers,
        lifecycle_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_stress_run_creates_and_tears_down() {
    let stub = StubHub::new(2, 0);
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    run_stress_test(client, &fast_stress(5, 2, 1), "hub-stress-test", false)
        .await
        .unwrap();

    // Everything created during the run was deleted again.
    assert!(stub.user_names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_keep_leaves_ready_servers_behind() {
    let stub = StubHub::new(1, 0);
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    run_stress_test(client, &fast_stress(3, 3, 1), "hub-stress-test", true)
        .await
        .unwrap();

    assert_eq!(
        stub.user_names(),
        vec!["hub-stress-test-1", "hub-stress-test-2", "hub-stress-test-3"]
    );
    let users = stub.users.lock().unwrap();
    for user in users.values() {
        assert!(matches!(user.server, Some(StubServer::Ready)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resumed_run_continues_numbering() {
    let stub = StubHub::new(0, 0);
    stub.seed("hub-stress-test-1");
    stub.seed("hub-stress-test-2");
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    run_stress_test(client, &fast_stress(2, 2, 1), "hub-stress-test", true)
        .await
        .unwrap();

    assert_eq!(
        stub.user_names(),
        vec![
            "hub-stress-test-1",
            "hub-stress-test-2",
            "hub-stress-test-3",
            "hub-stress-test-4",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_purge_removes_only_prefixed_users() {
    let stub = StubHub::new(0, 1);
    stub.seed("hub-stress-test-1");
    stub.seed("hub-stress-test-2");
    stub.seed("alice");
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    purge(client, &fast_stress(10, 10, 1), "hub-stress-test")
        .await
        .unwrap();

    assert_eq!(stub.user_names(), vec!["alice"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_retries_through_429() {
    let stub = StubHub::new(0, 0);
    stub.reject_creates.store(2, Ordering::SeqCst);
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    run_stress_test(client, &fast_stress(2, 2, 1), "hub-stress-test", true)
        .await
        .unwrap();

    // Both injected 429s were absorbed by the client's retry policy.
    assert_eq!(
        stub.user_names(),
        vec!["hub-stress-test-1", "hub-stress-test-2"]
    );
}

/// Serve raw HTTP on a loopback port, stalling the first `stalls` connections
/// without ever responding so the client's request timeout fires. Subsequent
/// connections get a minimal 200 with an empty JSON array body. Returns the
/// bound address and a counter of accepted connections.
async fn spawn_stalling_hub(stalls: usize) -> (std::net::SocketAddr, Arc<AtomicUsize>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let remaining = Arc::new(AtomicUsize::new(stalls));
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let remaining = Arc::clone(&remaining);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                if remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    // Hold the connection open past the client's timeout.
                    tokio::time::sleep(Duration::from_secs(30)).await;
                } else {
                    let body = "[]";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                }
            });
        }
    });

    (addr, accepted)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_timeouts_are_retried_until_success() {
    let (addr, accepted) = spawn_stalling_hub(2).await;

    let hub = HubConfig {
        endpoint: format!("http://{}/hub/api", addr),
        token: TOKEN.to_string(),
        username_prefix: "hub-stress-test".to_string(),
    };
    let mut http = HttpConfig::default();
    http.timeout = Duration::from_millis(200);
    http.list_users_timeout = Duration::from_millis(200);
    http.retry.max_attempts = 5;
    http.retry.backoff_factor = Duration::from_millis(10);
    let client = HubClient::new(&hub, &http, false).unwrap();

    let resp = client.list_users().await.unwrap();
    assert!(resp.success);
    // Two stalled connections timed out before the third one answered.
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_connect_errors_exhaust_retry_budget() {
    // Reserve a port, then close it so every connection is refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let hub = HubConfig {
        endpoint: format!("http://{}/hub/api", addr),
        token: TOKEN.to_string(),
        username_prefix: "hub-stress-test".to_string(),
    };
    let mut http = HttpConfig::default();
    http.retry.max_attempts = 2;
    http.retry.backoff_factor = Duration::from_millis(50);
    let client = HubClient::new(&hub, &http, false).unwrap();

    let start = std::time::Instant::now();
    let err = client.get_user("hub-stress-test-1").await.unwrap_err();
    assert!(matches!(err, HttpError::Network(_)));
    // The second attempt only happens after one backoff delay.
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bad_token_aborts_immediately() {
    let stub = StubHub::new(0, 0);
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, "wrong-token");

    let result = run_stress_test(client, &fast_stress(2, 2, 1), "hub-stress-test", false).await;
    assert!(matches!(result, Err(StressError::InvalidToken)));
    assert!(stub.user_names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_activity_run_end_to_end() {
    let stub = StubHub::new(0, 0);
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    let report = run_activity(client, &fast_stress(4, 10, 2), "hub-stress-test", false, false)
        .await
        .unwrap();

    let activity = report.activity.unwrap();
    assert_eq!(activity.count, 4);
    assert!(activity.min <= activity.mean && activity.mean <= activity.max);
    assert!(report.probe.unwrap().count > 0);
    // keep = false tore the users down afterwards.
    assert!(stub.user_names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulate_activity_against_seeded_users() {
    let stub = StubHub::new(0, 0);
    for i in 1..=6 {
        stub.seed(&format!("hub-stress-test-{}", i));
    }
    let endpoint = spawn_hub(stub.clone()).await;
    let client = client_for(&endpoint, TOKEN);

    let usernames: Vec<String> = (1..=6).map(|i| format!("hub-stress-test-{}", i)).collect();
    let report = simulate_activity(client, &usernames, 4, false).await;

    // 6 users over 4 workers: chunk size 1, so only 4 get activity.
    assert_eq!(report.activity.unwrap().count, 4);
}
