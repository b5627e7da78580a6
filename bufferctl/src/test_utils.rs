//! Test utilities for CLI testing
//!
//! Provides a mock Buffer API server and helpers for exercising the request
//! engine and client against real HTTP.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Token the mock API accepts.
pub const TEST_TOKEN: &str = "test-token";

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Mock server state
#[derive(Debug, Clone)]
pub struct MockServerState {
    /// Connected profiles
    pub profiles: Arc<Mutex<Vec<Value>>>,
    /// Pending updates keyed by profile ID
    pub pending: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    /// Sent updates keyed by profile ID
    pub sent: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    /// Every request received on a Buffer API route
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Hit counters keyed by path
    pub hits: Arc<Mutex<HashMap<String, u32>>>,
    /// Remaining failures for `/test/flaky`
    pub failures_left: Arc<Mutex<u32>>,
}

impl Default for MockServerState {
    fn default() -> Self {
        let profiles = vec![
            json!({
                "id": "prof_1",
                "service": "twitter",
                "formatted_username": "@buffer",
                "avatar": "https://example.com/avatar1.png",
                "default": true,
                "counts": { "sent": 120, "pending": 1, "drafts": 2 },
                "created_at": 1700000000
            }),
            json!({
                "id": "prof_2",
                "service": "facebook",
                "formatted_username": "Buffer Page",
                "avatar": "https://example.com/avatar2.png",
                "default": false,
                "counts": { "sent": 40, "pending": 0, "drafts": 0 },
                "created_at": 1700000500
            }),
        ];

        let mut pending = HashMap::new();
        pending.insert(
            "prof_1".to_string(),
            vec![json!({
                "id": "upd_1",
                "text": "Hello world from Buffer CLI!",
                "profile_id": "prof_1",
                "status": "buffer",
                "created_at": 1700000000,
                "due_at": 1700100000,
                "media": {},
                "statistics": {}
            })],
        );

        let mut sent = HashMap::new();
        sent.insert(
            "prof_1".to_string(),
            vec![json!({
                "id": "upd_2",
                "text": "Already out there",
                "profile_id": "prof_1",
                "status": "sent",
                "created_at": 1699990000,
                "sent_at": 1700050000,
                "statistics": { "reach": 500, "clicks": 25, "retweets": 10, "favorites": 30, "mentions": 2 }
            })],
        );

        Self {
            profiles: Arc::new(Mutex::new(profiles)),
            pending: Arc::new(Mutex::new(pending)),
            sent: Arc::new(Mutex::new(sent)),
            requests: Arc::new(Mutex::new(Vec::new())),
            hits: Arc::new(Mutex::new(HashMap::new())),
            failures_left: Arc::new(Mutex::new(0)),
        }
    }
}

impl MockServerState {
    fn record(&self, method: &Method, path: &str, query: Option<String>, headers: &HeaderMap, body: &Bytes) {
        *self.hits.lock().unwrap().entry(path.to_string()).or_insert(0) += 1;
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            query: query.unwrap_or_default(),
            content_type: headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }
}

/// Query parameters shared by the Buffer routes
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    access_token: Option<String>,
}

/// Query parameters for scripted status responses
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    body: Option<String>,
    retry_after: Option<String>,
}

/// Mock server implementation
#[derive(Debug)]
pub struct MockServer {
    state: MockServerState,
    port: u16,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    /// Create a new mock server
    pub fn new() -> Self {
        Self {
            state: MockServerState::default(),
            port: 0, // Will be assigned when server starts
        }
    }

    /// Start the mock server and return its root URL.
    ///
    /// The Buffer API lives under `<url>/1`.
    pub async fn start(mut self) -> Result<(Self, String)> {
        let app = self.create_router();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        self.port = addr.port();

        let server_url = format!("http://127.0.0.1:{}", self.port);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Mock server error: {}", e);
            }
        });

        // Give the server a moment to start and verify it's running
        for _ in 0..20 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Ok((self, server_url))
    }

    /// Get the server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the server state
    pub fn state(&self) -> &MockServerState {
        &self.state
    }

    /// Make the next `count` calls to `/test/flaky` answer 503.
    pub fn fail_next(&self, count: u32) {
        *self.state.failures_left.lock().unwrap() = count;
    }

    /// Number of requests received for `path`.
    pub fn hits(&self, path: &str) -> u32 {
        self.state.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Most recent request received on a Buffer API route.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    /// Create the mock server router
    fn create_router(&self) -> Router {
        Router::new()
            // Buffer API
            .route("/1/user.json", get(user_handler))
            .route("/1/profiles.json", get(list_profiles_handler))
            .route("/1/profiles/:id", get(get_profile_handler))
            .route("/1/profiles/:id/updates/:kind", get(list_updates_handler))
            .route("/1/updates/create.json", post(create_update_handler))
            .route("/1/updates/:id/:action", post(update_action_handler))
            // Scripted behaviour
            .route("/test/echo", any(echo_handler))
            .route("/test/status/:code", get(status_handler))
            .route("/test/slow", get(slow_handler))
            .route("/test/flaky", get(flaky_handler))
            .with_state(self.state.clone())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

fn authorized(query: &TokenQuery) -> bool {
    query.access_token.as_deref() == Some(TEST_TOKEN)
}

/// Decode `a=1&b=2` into ordered pairs, keeping repeated keys.
fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|c| c.into_owned())
                    .unwrap_or_default()
            };
            (decode(key), decode(value))
        })
        .collect()
}

fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// Handler functions

async fn user_handler(Query(query): Query<TokenQuery>) -> Response {
    if !authorized(&query) {
        return unauthorized();
    }
    Json(json!({ "id": "user_1", "name": "Test User", "plan": "pro" })).into_response()
}

async fn list_profiles_handler(
    State(state): State<MockServerState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    if !authorized(&query) {
        return unauthorized();
    }
    let profiles = state.profiles.lock().unwrap().clone();
    Json(Value::Array(profiles)).into_response()
}

async fn get_profile_handler(
    Path(file): Path<String>,
    State(state): State<MockServerState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    if !authorized(&query) {
        return unauthorized();
    }
    // Route param carries the `.json` suffix
    let id = file.trim_end_matches(".json");
    let profiles = state.profiles.lock().unwrap();
    match profiles.iter().find(|p| p["id"] == id) {
        Some(profile) => Json(profile.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Profile not found" })),
        )
            .into_response(),
    }
}

async fn list_updates_handler(
    Path((id, kind)): Path<(String, String)>,
    State(state): State<MockServerState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<TokenQuery>,
) -> Response {
    state.record(
        &method,
        &format!("/1/profiles/{}/updates/{}", id, kind),
        raw,
        &headers,
        &Bytes::new(),
    );
    if !authorized(&query) {
        return unauthorized();
    }
    let store = match kind.as_str() {
        "pending.json" => &state.pending,
        "sent.json" => &state.sent,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    let updates = store.lock().unwrap().get(&id).cloned().unwrap_or_default();
    let total = updates.len();
    Json(json!({ "updates": updates, "total": total })).into_response()
}

async fn create_update_handler(
    State(state): State<MockServerState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    state.record(&method, "/1/updates/create.json", raw, &headers, &body);
    if !authorized(&query) {
        return unauthorized();
    }

    let form = parse_form(&String::from_utf8_lossy(&body));
    let text = form_value(&form, "text").unwrap_or_default().to_string();
    if text.is_empty() {
        return Json(json!({ "success": false, "message": "Text is required" })).into_response();
    }

    let updates: Vec<Value> = form
        .iter()
        .filter(|(k, _)| k == "profile_ids[]")
        .enumerate()
        .map(|(i, (_, profile_id))| {
            json!({
                "id": format!("new_{}", i + 1),
                "text": text,
                "profile_id": profile_id,
                "status": "buffer",
                "created_at": 1700000000,
                "due_at": 1700200000
            })
        })
        .collect();

    Json(json!({
        "success": true,
        "buffer_count": updates.len(),
        "buffer_percentage": 10,
        "updates": updates
    }))
    .into_response()
}

async fn update_action_handler(
    Path((id, action)): Path<(String, String)>,
    State(state): State<MockServerState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    state.record(
        &method,
        &format!("/1/updates/{}/{}", id, action),
        raw,
        &headers,
        &body,
    );
    if !authorized(&query) {
        return unauthorized();
    }
    if id == "missing" {
        return Json(json!({ "success": false, "message": "Update not found" })).into_response();
    }

    match action.as_str() {
        "update.json" => {
            let form = parse_form(&String::from_utf8_lossy(&body));
            let text = form_value(&form, "text").unwrap_or_default();
            Json(json!({
                "success": true,
                "update": {
                    "id": id,
                    "text": text,
                    "profile_id": "prof_1",
                    "status": "buffer",
                    "created_at": 1700000000
                }
            }))
            .into_response()
        }
        "destroy.json" | "share.json" => Json(json!({ "success": true })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn echo_handler(
    method: Method,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> Json<Value> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.to_string(),
        "query": raw.unwrap_or_default(),
        "content_type": header_str("content-type"),
        "x_trace": header_str("x-trace"),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn status_handler(Path(code): Path<u16>, Query(query): Query<StatusQuery>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, query.body.unwrap_or_default()).into_response();
    if let Some(retry_after) = query.retry_after {
        if let Ok(value) = retry_after.parse() {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

async fn slow_handler() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({}))
}

async fn flaky_handler(State(state): State<MockServerState>) -> Response {
    *state
        .hits
        .lock()
        .unwrap()
        .entry("/test/flaky".to_string())
        .or_insert(0) += 1;

    let mut failures_left = state.failures_left.lock().unwrap();
    if *failures_left > 0 {
        *failures_left -= 1;
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Try again" })),
        )
            .into_response();
    }
    Json(json!({ "ok": true })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_startup() {
        let server = MockServer::new();
        let (server, url) = server.start().await.unwrap();

        assert!(server.port() > 0);
        assert!(url.contains(&server.port().to_string()));

        // Test basic connectivity
        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/1/user.json?access_token={}", url, TEST_TOKEN))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn test_rejects_unknown_token() {
        let (_, url) = MockServer::new().start().await.unwrap();

        let response = reqwest::Client::new()
            .get(format!("{}/1/profiles.json?access_token=bad", url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_parse_form_keeps_repeated_keys() {
        let form = parse_form("profile_ids%5B%5D=a&profile_ids%5B%5D=b&text=hi+there");
        assert_eq!(
            form,
            vec![
                ("profile_ids[]".to_string(), "a".to_string()),
                ("profile_ids[]".to_string(), "b".to_string()),
                ("text".to_string(), "hi there".to_string()),
            ]
        );
    }
}
