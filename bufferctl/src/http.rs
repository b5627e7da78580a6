//! Request engine for the Buffer REST API.
//!
//! Builds authenticated URLs, encodes request bodies, performs a single HTTP
//! call under a timeout and classifies the outcome into an [`ApiError`].
//! [`with_retry`] adds exponential backoff on top for callers that want it.
//!
//! Nothing in this module logs or terminates the process; every failure is
//! returned to the caller.

use buffer_core::{ApiError, ACCESS_TOKEN_PARAM, DEFAULT_API_URL, DEFAULT_RETRY_AFTER_SECS};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Timeout applied when a request does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Build an endpoint URL against the public Buffer API.
///
/// See [`build_url_with_base`].
pub fn build_url(path: &str, token: &str, params: &[(&str, &str)]) -> String {
    build_url_with_base(DEFAULT_API_URL, path, token, params)
}

/// Build an endpoint URL: `base + path`, with `access_token` always set.
///
/// Extra parameters are applied after the token, in the given order. A key
/// that is already present has its value replaced in place; new keys are
/// appended. Keys and values are percent-encoded.
pub fn build_url_with_base(
    base: &str,
    path: &str,
    token: &str,
    params: &[(&str, &str)],
) -> String {
    let mut query: Vec<(&str, &str)> = vec![(ACCESS_TOKEN_PARAM, token)];
    for &(key, value) in params {
        match query.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => query.push((key, value)),
        }
    }

    format!(
        "{}{}?{}",
        base.trim_end_matches('/'),
        path,
        encode_pairs(query.iter().copied())
    )
}

fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// A form field value: a single string or a multi-valued list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Single(String),
    Multi(Vec<String>),
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Single(value)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for FormValue {
    fn from(values: Vec<String>) -> Self {
        FormValue::Multi(values)
    }
}

/// Ordered `application/x-www-form-urlencoded` body.
///
/// Field order is insertion order. Re-inserting a key replaces its value
/// without moving it. Serializes as a JSON object (for dry runs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    fields: Vec<(String, FormValue)>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FormValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder form of [`FormBody::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Encode as `k=v&k=v`. Multi-valued fields repeat the key once per
    /// element, in element order.
    pub fn encode(&self) -> String {
        encode_pairs(self.fields.iter().flat_map(|(key, value)| {
            let values: Vec<&str> = match value {
                FormValue::Single(v) => vec![v.as_str()],
                FormValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
            };
            values.into_iter().map(move |v| (key.as_str(), v))
        }))
    }
}

impl Serialize for FormBody {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Per-call request description.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// JSON body; ignored when `form_body` is set or when it is `null`.
    pub body: Option<serde_json::Value>,
    pub form_body: Option<FormBody>,
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            form_body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_form(mut self, form: FormBody) -> Self {
        self.form_body = Some(form);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Perform one HTTP call and decode the JSON payload into `T`.
///
/// The whole exchange (send and body read) runs inside a timeout scope, so
/// the timer is released on every exit path. No schema validation is done
/// beyond what deserializing into `T` implies.
///
/// # Errors
///
/// - 429: [`ErrorCode::RateLimited`](buffer_core::ErrorCode::RateLimited),
///   `retry_after` from the `Retry-After` header or 60
/// - 401/403: [`ErrorCode::AuthFailed`](buffer_core::ErrorCode::AuthFailed)
/// - other non-2xx: [`ErrorCode::Api`](buffer_core::ErrorCode::Api) with the
///   message taken from the body
/// - network failure or timeout:
///   [`ErrorCode::Transport`](buffer_core::ErrorCode::Transport), status 0
pub async fn request<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    options: RequestOptions,
) -> Result<T, ApiError> {
    let timeout = options.timeout;

    match tokio::time::timeout(timeout, execute(client, url, options)).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::transport(format!(
            "Request timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

async fn execute<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    options: RequestOptions,
) -> Result<T, ApiError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::transport(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::transport(format!("Invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }

    let body = if let Some(form) = &options.form_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        Some(form.encode())
    } else if let Some(json) = options.body.as_ref().filter(|json| !json.is_null()) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Some(json.to_string())
    } else {
        None
    };

    let mut builder = client.request(options.method, url).headers(headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(transport_error)?;
    classify(response).await
}

/// Map a response onto the payload or a classified error.
async fn classify<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ApiError::rate_limited(retry_after));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::auth_failed(status.as_u16()));
    }

    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(ApiError::api(status.as_u16(), error_message(status, &text)));
    }

    serde_json::from_str(&text).map_err(|e| {
        ApiError::api(
            status.as_u16(),
            format!("Failed to parse response: {}", e),
        )
    })
}

/// Integer seconds only; HTTP-date values fall back to the default.
fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Best-effort message for a failed response: JSON `error`, then JSON
/// `message`, then the raw body, then `HTTP <status>`.
fn error_message(status: StatusCode, text: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        for field in ["error", "message"] {
            match json.get(field) {
                None | Some(serde_json::Value::Null) => continue,
                Some(serde_json::Value::String(message)) => return message.clone(),
                Some(other) => return other.to_string(),
            }
        }
    }

    if text.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        text.to_string()
    }
}

/// The URL carries the access token, so it is stripped from the message.
fn transport_error(error: reqwest::Error) -> ApiError {
    let error = error.without_url();
    if error.is_timeout() {
        ApiError::transport(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        ApiError::transport(format!("Connection failed: {}", error))
    } else {
        ApiError::transport(format!("Request failed: {}", error))
    }
}

/// Retry budget and backoff schedule for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Delay before retry `n` (1-indexed): `initial_delay * 2^(n-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        with_retry(operation, self.max_retries, self.initial_delay).await
    }
}

/// Invoke `operation` until it succeeds, making at most `max_retries + 1`
/// attempts.
///
/// Waits `initial_delay * 2^(n-1)` before retry `n`. Every error is retried
/// the same way, including rate limiting; callers that want to honour
/// `retry_after` should inspect the error themselves. The last error is
/// returned unchanged once the budget is spent.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let policy = RetryPolicy::new(max_retries, initial_delay);
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if retry >= max_retries => return Err(error),
            Err(_) => {
                retry += 1;
                tokio::time::sleep(policy.delay_for(retry)).await;
            }
        }
    }
}
