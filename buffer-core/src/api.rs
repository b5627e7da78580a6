//! API models for the Buffer v1 REST API
//!
//! Response shapes are decoded leniently: fields the CLI does not need are
//! ignored and optional fields default rather than failing the decode.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Authenticated user (`/user.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
}

/// Post counters attached to a profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileCounts {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sent: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub drafts: u64,
}

/// Connected social profile (`/profiles.json`, `/profiles/{id}.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formatted_username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub default: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub counts: ProfileCounts,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
}

/// Media attachment of an update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Media {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Interaction statistics of a sent update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Statistics {
    #[serde(default, deserialize_with = "null_as_default")]
    pub reach: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clicks: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweets: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorites: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mentions: u64,
}

/// A scheduled or sent post ("update" in Buffer terms)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// Page of updates (`/profiles/{id}/updates/{pending,sent}.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub updates: Vec<Update>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
}

/// Result of `/updates/create.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUpdateResponse {
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buffer_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buffer_percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updates: Vec<Update>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of `/updates/{id}/update.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditUpdateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of endpoints that only report success (destroy, share)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimpleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
