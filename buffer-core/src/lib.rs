//! Buffer Core Library
//!
//! Shared wire types and the structured error for the Buffer command-line
//! client. The HTTP layer, formatter and CLI live in `bufferctl`.

pub mod api;
pub mod error;

// Re-export commonly used types
pub use api::*;
pub use error::*;

/// Base URL of the Buffer v1 REST API.
pub const DEFAULT_API_URL: &str = "https://api.bufferapp.com/1";

/// Name of the query parameter carrying the bearer credential.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";
