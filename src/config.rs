//! Layered configuration for the Forest client.
//!
//! Settings are read from `.forest/forest.toml`, then overridden by the
//! environment, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1:1234"
//! token = "secret"
//! websocket_path = "/websocket"
//!
//! [timeouts]
//! request_secs = 10
//! reconnect_delay_secs = 3
//! ```
//!
//! `FOREST_HOST` and `FOREST_TOKEN` override the file. When the project has
//! no `.forest/forest.toml`, `forest/forest.toml` under the user config
//! directory is used instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR: &str = ".forest";
pub const CONFIG_FILE: &str = "forest.toml";
pub const HOST_ENV: &str = "FOREST_HOST";
pub const TOKEN_ENV: &str = "FOREST_TOKEN";

/// Backend location and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// `host:port`, optionally with an `http://` or `https://` scheme
    #[serde(default = "default_host")]
    pub host: String,
    /// Shared secret sent in the `token` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_websocket_path")]
    pub websocket_path: String,
}

fn default_host() -> String {
    "127.0.0.1:1234".to_string()
}

fn default_websocket_path() -> String {
    "/websocket".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            token: None,
            websocket_path: default_websocket_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsSection {
    /// Upper bound on a single command round trip
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    /// Fixed pause between socket reconnect attempts
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_request_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

/// Contents of `forest.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForestToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
}

impl ForestToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse forest.toml")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize forest.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.host.trim().is_empty() {
            warnings.push("server.host is empty".to_string());
        }
        if !self.server.websocket_path.starts_with('/') {
            warnings.push(format!(
                "server.websocket_path '{}' should start with '/'",
                self.server.websocket_path
            ));
        }
        if !(1..=60).contains(&self.timeouts.reconnect_delay_secs) {
            warnings.push(format!(
                "timeouts.reconnect_delay_secs = {} is outside 1..=60",
                self.timeouts.reconnect_delay_secs
            ));
        }
        if self.timeouts.request_secs == 0 {
            warnings.push("timeouts.request_secs = 0 fails every request".to_string());
        }

        warnings
    }
}

/// Resolved configuration: file, then environment, then CLI.
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub project_dir: PathBuf,
    /// File the settings came from, if any
    pub source: Option<PathBuf>,
    pub toml: ForestToml,
    pub cli_host: Option<String>,
    pub cli_token: Option<String>,
}

impl ForestConfig {
    /// Load from an explicit file, or discover one for `project_dir`.
    pub fn load(project_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let source = match config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path)
            }
            None => discover(&project_dir),
        };
        let toml = match &source {
            Some(path) => ForestToml::load(path)?,
            None => ForestToml::default(),
        };

        Ok(Self {
            project_dir,
            source,
            toml,
            cli_host: None,
            cli_token: None,
        })
    }

    pub fn with_cli_args(mut self, host: Option<String>, token: Option<String>) -> Self {
        self.cli_host = host;
        self.cli_token = token;
        self
    }

    /// Where `config init` writes.
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Host (CLI → env → file).
    pub fn host(&self) -> String {
        self.cli_host
            .clone()
            .or_else(|| non_empty_env(HOST_ENV))
            .unwrap_or_else(|| self.toml.server.host.clone())
    }

    /// Token (CLI → env → file). Empty means none.
    pub fn token(&self) -> Option<String> {
        self.cli_token
            .clone()
            .or_else(|| non_empty_env(TOKEN_ENV))
            .or_else(|| self.toml.server.token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Base URL for `POST /` and `/api/*`.
    pub fn http_base_url(&self) -> String {
        let host = self.host();
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    /// Socket URL: same host, `ws`/`wss` scheme, configured path.
    pub fn websocket_url(&self) -> String {
        let base = self.http_base_url();
        let base = match base.strip_prefix("https://") {
            Some(rest) => format!("wss://{rest}"),
            None => format!("ws://{}", base.trim_start_matches("http://")),
        };
        let path = &self.toml.server.websocket_path;
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.timeouts.request_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.toml.timeouts.reconnect_delay_secs)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if self.host().trim().is_empty() {
            warnings.push("Resolved host is empty".to_string());
        }
        warnings.dedup();
        warnings
    }
}

fn discover(project_dir: &Path) -> Option<PathBuf> {
    let local = ForestConfig::default_path(project_dir);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("forest").join(CONFIG_FILE))
        .filter(|path| path.exists())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
