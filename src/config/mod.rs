//! Configuration module for Piwigo Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Command-line flags are
//! applied on top with [`Config::apply_overrides`].
//!
//! # Example
//!
//! ```yaml
//! gallery:
//!   url: "https://gallery.example.com"
//!   username: "${PIWIGO_USER}"
//!   password: "${PIWIGO_PASSWORD}"
//! upload:
//!   chunk_size_kb: 512        # optional, defaults to the server's value
//!   existence_batch_size: 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Values supplied on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub chunk_size_kb: Option<u64>,
    pub existence_batch_size: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Apply command-line values over the loaded ones
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.gallery.url = url;
        }
        if let Some(username) = overrides.username {
            self.gallery.username = username;
        }
        if let Some(password) = overrides.password {
            self.gallery.password = password;
        }
        if overrides.chunk_size_kb.is_some() {
            self.upload.chunk_size_kb = overrides.chunk_size_kb;
        }
        if let Some(batch) = overrides.existence_batch_size {
            self.upload.existence_batch_size = batch;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gallery.url.is_empty() {
            return Err(ConfigError::ValidationError("missing gallery url".into()));
        }

        if !is_valid_http_url(&self.gallery.url) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid gallery url '{}': must start with http:// or https://",
                self.gallery.url
            )));
        }

        if self.gallery.username.trim().is_empty() {
            return Err(ConfigError::ValidationError("missing gallery user".into()));
        }

        if self.gallery.password.is_empty() {
            return Err(ConfigError::ValidationError(
                "missing gallery password".into(),
            ));
        }

        if self.upload.chunk_size_kb == Some(0) {
            return Err(ConfigError::ValidationError(
                "chunk_size_kb must be greater than zero (512 is a sensible start)".into(),
            ));
        }

        if let Some(kib) = self.upload.chunk_size_kb {
            kib_to_bytes(kib)?;
        }

        if self.upload.existence_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "existence_batch_size must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Gallery connection and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Root URL of the installation, without `ws.php`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Chunk size in KiB; the server-reported value is used when unset
    #[serde(default)]
    pub chunk_size_kb: Option<u64>,
    #[serde(default = "default_existence_batch_size")]
    pub existence_batch_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_kb: None,
            existence_batch_size: default_existence_batch_size(),
        }
    }
}

impl UploadConfig {
    /// Effective chunk size in bytes given the server-reported KiB value
    pub fn chunk_size_bytes(&self, server_chunk_size_kb: u64) -> Result<u64, ConfigError> {
        kib_to_bytes(self.chunk_size_kb.unwrap_or(server_chunk_size_kb))
    }
}

fn kib_to_bytes(kib: u64) -> Result<u64, ConfigError> {
    kib.checked_mul(1024).ok_or_else(|| {
        ConfigError::ValidationError(format!("chunk size of {kib} KiB is too large"))
    })
}

fn default_existence_batch_size() -> usize {
    crate::upload::DEFAULT_EXISTENCE_BATCH_SIZE
}
