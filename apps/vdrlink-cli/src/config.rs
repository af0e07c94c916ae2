//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/vdrlink/config.toml`
//! - Windows: `%APPDATA%/vdrlink/config.toml`
//!
//! Command-line flags (and `VDR_TOKEN`) take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vdrlink_client::ClientConfig;
use vdrlink_uploader::UploadOptions;

use crate::Cli;

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service API root, e.g. `https://vdr.example.com/api/v1`.
    #[serde(default)]
    pub base_url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Send a SHA-256 checksum header with every chunk.
    #[serde(default = "default_true")]
    pub send_checksums: bool,

    /// Whole-file attempts. Each attempt starts over with a new document id.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Seconds to wait between attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_timeout_secs() -> u64 {
    vdrlink_protocol::constants::CHUNK_REQUEST_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
            send_checksums: default_true(),
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Config {
    /// Loads the per-user configuration, or defaults if there is none.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Applies command-line flags on top of the file values.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(token) = &cli.token
            && !token.is_empty()
        {
            self.token = token.clone();
        }
        if let Some(attempts) = cli.max_attempts {
            self.max_attempts = attempts;
        }
        if cli.no_checksums {
            self.send_checksums = false;
        }
    }

    /// Checks that everything needed to reach the service is present.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("no service URL configured (use --base-url or set base_url)");
        }
        if self.token.trim().is_empty() {
            anyhow::bail!("no access token configured (use --token, VDR_TOKEN or set token)");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.base_url.clone(), self.token.clone());
        config.timeout = Duration::from_secs(self.timeout_secs.max(1));
        config
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            send_checksums: self.send_checksums,
            ..UploadOptions::default()
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("vdrlink")
            .join("config.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("vdrlink").join("config.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/vdrlink/config.toml")
    }
}
