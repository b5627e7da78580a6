//! Buffer CLI Library
//!
//! This library provides the core functionality for the `bufferctl` tool.
//!
//! # Public API
//!
//! The request engine lives in [`http`]: URL building with the access token,
//! form encoding, timeouts, status classification and retry with backoff.
//! [`client::BufferClient`] wraps it with typed Buffer endpoints, and
//! [`format`] renders results as JSON, a table or CSV.
//!
//! ```no_run
//! use bufferctl::client::BufferClient;
//! use bufferctl::http::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = BufferClient::with_config(
//!     "https://api.bufferapp.com/1",
//!     "my-access-token",
//!     Duration::from_secs(30),
//!     Some(RetryPolicy::default()),
//! )?;
//!
//! let user = client.get_user().await?;
//! println!("Signed in as {}", user.name);
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// Typed client for the Buffer API.
pub mod client;

/// Configuration file, environment overrides and token storage.
pub mod config;

/// JSON/table/CSV rendering of results and errors.
pub mod format;

/// Request engine: URLs, form bodies, timeouts, classification, retry.
pub mod http;

#[cfg(test)]
pub mod test_utils;
