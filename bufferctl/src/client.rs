//! HTTP client for the Buffer v1 REST API.

use anyhow::{Context, Result};
use buffer_core::{
    ApiError, CreateUpdateResponse, EditUpdateResponse, Profile, SimpleResponse, UpdatesResponse,
    User, ACCESS_TOKEN_PARAM, DEFAULT_API_URL,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::http::{self, FormBody, RequestOptions, RetryPolicy};

/// Normalize a base URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Percent-encode a user-supplied path segment.
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Typed client for the Buffer API.
///
/// Every call carries the access token as a query parameter. Read-only
/// calls are retried with exponential backoff when a [`RetryPolicy`] is
/// configured; POST calls are never retried.
///
/// # Examples
///
/// ```no_run
/// use bufferctl::client::BufferClient;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = BufferClient::new("my-access-token")?;
/// for profile in client.list_profiles().await? {
///     println!("{} {}", profile.id, profile.service);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BufferClient {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
    retry: Option<RetryPolicy>,
}

impl BufferClient {
    /// Client for the public API with default timeout and no retries.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_config(DEFAULT_API_URL, token, http::DEFAULT_TIMEOUT, None)
    }

    /// Create a client with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base, e.g. `https://api.bufferapp.com/1`
    /// * `token` - Access token sent with every request
    /// * `timeout` - Per-request timeout
    /// * `retry` - Backoff policy for GET requests, `None` to disable
    pub fn with_config(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
        retry: Option<RetryPolicy>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("bufferctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: normalize_url(base_url),
            token: token.into(),
            timeout,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL for `path` with the token and `params` applied.
    pub fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        http::build_url_with_base(&self.base_url, path, &self.token, params)
    }

    /// `url` with the `access_token` query value masked, for diagnostics.
    pub fn redact(&self, url: &str) -> String {
        let Some((base, query)) = url.split_once('?') else {
            return url.to_string();
        };

        let query = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((ACCESS_TOKEN_PARAM, _)) => format!("{}=***", ACCESS_TOKEN_PARAM),
                _ => pair.to_string(),
            })
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", base, query)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(path, params);
        debug!("GET {}", self.redact(&url));

        let options = RequestOptions::get().with_timeout(self.timeout);
        match &self.retry {
            Some(policy) => {
                policy
                    .run(|| http::request(&self.client, &url, options.clone()))
                    .await
            }
            None => http::request(&self.client, &url, options).await,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Option<FormBody>,
    ) -> Result<T, ApiError> {
        let url = self.url(path, &[]);
        debug!("POST {}", self.redact(&url));

        let mut options = RequestOptions::post().with_timeout(self.timeout);
        if let Some(form) = form {
            debug!("Body: {}", form.encode());
            options = options.with_form(form);
        }

        http::request(&self.client, &url, options).await
    }

    /// Retrieve the authenticated user.
    pub async fn get_user(&self) -> Result<User, ApiError> {
        self.get("/user.json", &[]).await
    }

    /// Retrieve all connected social profiles.
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, ApiError> {
        self.get("/profiles.json", &[]).await
    }

    /// Retrieve a single profile.
    pub async fn get_profile(&self, profile_id: &str) -> Result<Profile, ApiError> {
        self.get(&format!("/profiles/{}.json", segment(profile_id)), &[])
            .await
    }

    /// Retrieve one page of a profile's queued updates.
    pub async fn pending_updates(
        &self,
        profile_id: &str,
        count: u32,
        page: u32,
    ) -> Result<UpdatesResponse, ApiError> {
        self.updates(profile_id, "pending", count, page).await
    }

    /// Retrieve one page of a profile's sent updates.
    pub async fn sent_updates(
        &self,
        profile_id: &str,
        count: u32,
        page: u32,
    ) -> Result<UpdatesResponse, ApiError> {
        self.updates(profile_id, "sent", count, page).await
    }

    async fn updates(
        &self,
        profile_id: &str,
        kind: &str,
        count: u32,
        page: u32,
    ) -> Result<UpdatesResponse, ApiError> {
        let path = format!("/profiles/{}/updates/{}.json", segment(profile_id), kind);
        let count = count.to_string();
        let page = page.to_string();

        self.get(&path, &[("count", &count), ("page", &page)]).await
    }

    /// Create an update on one or more profiles.
    pub async fn create_update(&self, update: &NewUpdate) -> Result<CreateUpdateResponse, ApiError> {
        self.post("/updates/create.json", Some(update.to_form()))
            .await
    }

    /// Edit the text, media or schedule of an existing update.
    pub async fn edit_update(
        &self,
        update_id: &str,
        edit: &UpdateEdit,
    ) -> Result<EditUpdateResponse, ApiError> {
        self.post(
            &format!("/updates/{}/update.json", segment(update_id)),
            Some(edit.to_form()),
        )
        .await
    }

    /// Permanently delete an update.
    pub async fn destroy_update(&self, update_id: &str) -> Result<SimpleResponse, ApiError> {
        self.post(&format!("/updates/{}/destroy.json", segment(update_id)), None)
            .await
    }

    /// Share an update immediately.
    pub async fn share_update(&self, update_id: &str) -> Result<SimpleResponse, ApiError> {
        self.post(&format!("/updates/{}/share.json", segment(update_id)), None)
            .await
    }
}

/// Fields of a new update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUpdate {
    pub profile_ids: Vec<String>,
    pub text: String,
    pub media_link: Option<String>,
    pub media_description: Option<String>,
    pub scheduled_at: Option<String>,
    /// Share immediately instead of queueing
    pub now: bool,
}

impl NewUpdate {
    /// Form body in Buffer's bracket notation.
    pub fn to_form(&self) -> FormBody {
        let mut form = FormBody::new()
            .with("profile_ids[]", self.profile_ids.clone())
            .with("text", self.text.as_str());
        add_media_and_schedule(
            &mut form,
            &self.media_link,
            &self.media_description,
            &self.scheduled_at,
        );
        if self.now {
            form.insert("now", "true");
        }
        form
    }
}

/// Fields of an update edit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateEdit {
    pub text: String,
    pub media_link: Option<String>,
    pub media_description: Option<String>,
    pub scheduled_at: Option<String>,
}

impl UpdateEdit {
    pub fn to_form(&self) -> FormBody {
        let mut form = FormBody::new().with("text", self.text.as_str());
        add_media_and_schedule(
            &mut form,
            &self.media_link,
            &self.media_description,
            &self.scheduled_at,
        );
        form
    }
}

fn add_media_and_schedule(
    form: &mut FormBody,
    media_link: &Option<String>,
    media_description: &Option<String>,
    scheduled_at: &Option<String>,
) {
    if let Some(link) = media_link {
        form.insert("media[link]", link.as_str());
    }
    if let Some(description) = media_description {
        form.insert("media[description]", description.as_str());
    }
    if let Some(scheduled_at) = scheduled_at {
        form.insert("scheduled_at", scheduled_at.as_str());
    }
}
