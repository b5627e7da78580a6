//! CLI configuration management
//!
//! Handles loading and saving the CLI config file, the settings priority
//! chain and access-token resolution.

use anyhow::{Context, Result};
use buffer_core::DEFAULT_API_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding an access token.
pub const TOKEN_ENV: &str = "BUFFER_ACCESS_TOKEN";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "BUFFER_CONFIG";

/// Stored credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// OAuth2 access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,
}

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Buffer API base URL
    pub api_url: String,

    /// Default output format
    pub output_format: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Retry budget for read-only requests (0 disables retries)
    pub retries: u32,

    /// Stored credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            output_format: "json".to_string(),
            timeout: 30,
            retries: 0,
            auth: None,
        }
    }
}

impl CliConfig {
    /// Create a new builder for constructing configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Stored access token, if any
    pub fn oauth_token(&self) -> Option<&str> {
        self.auth.as_ref()?.oauth_token.as_deref()
    }
}

/// Config file handle. Passed explicitly to whatever needs to read or
/// persist settings.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$BUFFER_CONFIG`, or the default location.
    pub fn open_default() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Ok(Self::new(path)),
            _ => Ok(Self::new(Self::default_path()?)),
        }
    }

    /// `<config dir>/buffer/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
        Ok(config_dir.join("buffer").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file. A missing file reads as the defaults.
    pub fn read(&self) -> Result<CliConfig> {
        if !self.path.exists() {
            return Ok(CliConfig::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file {}", self.path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", self.path.display()))
    }

    /// Save configuration to file
    pub fn write(&self, config: &CliConfig) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(config).context("Failed to serialize CLI config")?;

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config file {}", self.path.display()))?;

        Ok(())
    }
}

/// Resolve the access token: explicit value, then `BUFFER_ACCESS_TOKEN`,
/// then the config file.
pub fn resolve_token(flag: Option<&str>, store: &ConfigStore) -> Option<String> {
    if let Some(token) = flag.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Some(token);
        }
    }

    store.read().ok()?.oauth_token().map(str::to_string)
}

/// Like [`resolve_token`], but a missing token is an error listing where one
/// can come from.
pub fn require_token(flag: Option<&str>, store: &ConfigStore) -> Result<String> {
    resolve_token(flag, store).ok_or_else(|| {
        anyhow::anyhow!(
            "No access token found. Provide one via:\n  \
             1. --access-token flag\n  \
             2. {} environment variable\n  \
             3. bufferctl auth login <token>",
            TOKEN_ENV
        )
    })
}

/// Persist `token` in the config file, keeping the other settings.
pub fn save_token(store: &ConfigStore, token: &str) -> Result<()> {
    let mut config = store.read()?;
    config.auth.get_or_insert_with(AuthConfig::default).oauth_token = Some(token.to_string());
    store.write(&config)
}

/// Remove stored credentials from the config file.
pub fn clear_auth(store: &ConfigStore) -> Result<()> {
    let mut config = store.read()?;
    config.auth = None;
    store.write(&config)
}

/// Builder for CLI configuration with validation and priority chain support
///
/// Layers are applied lowest priority first, each one overriding the values
/// it sets:
/// 1. Defaults
/// 2. Config file
/// 3. Environment variables
/// 4. CLI arguments
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    api_url: Option<String>,
    output_format: Option<String>,
    timeout: Option<u64>,
    retries: Option<u32>,
    auth: Option<AuthConfig>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API URL (with validation)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        Self::validate_url(&url)?;
        self.api_url = Some(url);
        Ok(self)
    }

    /// Set output format (with validation)
    pub fn with_output_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        Self::validate_output_format(&format)?;
        self.output_format = Some(format);
        Ok(self)
    }

    /// Set timeout (with validation)
    pub fn with_timeout(mut self, timeout: u64) -> Result<Self> {
        Self::validate_timeout(timeout)?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Set retry budget (with validation)
    pub fn with_retries(mut self, retries: u32) -> Result<Self> {
        Self::validate_retries(retries)?;
        self.retries = Some(retries);
        Ok(self)
    }

    /// Layer the config file's settings, unless `load_file` is false.
    ///
    /// An unreadable file is reported and skipped.
    pub fn with_config_file(self, store: &ConfigStore, load_file: bool) -> Self {
        if !load_file {
            return self;
        }

        match store.read() {
            Ok(config) => Self {
                api_url: Some(config.api_url),
                output_format: Some(config.output_format),
                timeout: Some(config.timeout),
                retries: Some(config.retries),
                auth: config.auth,
            },
            Err(e) => {
                tracing::warn!("Ignoring config file: {:#}", e);
                self
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BUFFER_API_URL") {
            if Self::validate_url(&url).is_ok() {
                self.api_url = Some(url);
            }
        }

        if let Ok(format) = std::env::var("BUFFER_OUTPUT") {
            if Self::validate_output_format(&format).is_ok() {
                self.output_format = Some(format);
            }
        }

        if let Ok(timeout) = std::env::var("BUFFER_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                if Self::validate_timeout(timeout).is_ok() {
                    self.timeout = Some(timeout);
                }
            }
        }

        if let Ok(retries) = std::env::var("BUFFER_RETRIES") {
            if let Ok(retries) = retries.parse() {
                if Self::validate_retries(retries).is_ok() {
                    self.retries = Some(retries);
                }
            }
        }

        self
    }

    /// Build the final configuration with validation
    pub fn build(self) -> Result<CliConfig> {
        let defaults = CliConfig::default();

        let api_url = self.api_url.unwrap_or(defaults.api_url);
        let output_format = self.output_format.unwrap_or(defaults.output_format);
        let timeout = self.timeout.unwrap_or(defaults.timeout);
        let retries = self.retries.unwrap_or(defaults.retries);

        // Validate final values (a config file may hold anything)
        Self::validate_url(&api_url)?;
        Self::validate_output_format(&output_format)?;
        Self::validate_timeout(timeout)?;
        Self::validate_retries(retries)?;

        Ok(CliConfig {
            api_url,
            output_format,
            timeout,
            retries,
            auth: self.auth,
        })
    }

    /// Validate URL format
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(anyhow::anyhow!("API URL cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!("API URL must start with http:// or https://"));
        }

        Ok(())
    }

    /// Validate output format
    fn validate_output_format(format: &str) -> Result<()> {
        match format {
            "json" | "table" | "csv" => Ok(()),
            _ => Err(anyhow::anyhow!(
                "Invalid output format '{}'. Must be 'json', 'table' or 'csv'",
                format
            )),
        }
    }

    /// Validate timeout value
    fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(anyhow::anyhow!("Timeout must be greater than 0"));
        }

        if timeout > 300 {
            return Err(anyhow::anyhow!(
                "Timeout must be less than or equal to 300 seconds"
            ));
        }

        Ok(())
    }

    /// Validate retry budget
    fn validate_retries(retries: u32) -> Result<()> {
        if retries > 10 {
            return Err(anyhow::anyhow!("Retries must be less than or equal to 10"));
        }

        Ok(())
    }
}
