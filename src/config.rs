//! Configuration loading and management.
//!
//! Values come from, lowest priority first:
//! 1. Built-in defaults
//! 2. A YAML file: `--config PATH`, else `./gist-tasks.yaml`, else `~/.gist-tasks/config.yaml`
//! 3. Environment variables (a `.env` file in the working directory is loaded first)
//!
//! ## Environment Variables
//! - `GIST_ID` - Remote document identifier
//! - `GIST_TOKEN` - Write credential for the remote document
//! - `FILENAME` - Logical file inside the document (default: `tasks.json`)
//! - `USER_AGENT` - Client identification string (default: `task-tracker`)
//! - `GIST_API_URL` - Document API base URL
//! - `CLOUDFLARE_ACCOUNT_ID` - Enrichment account
//! - `CLOUDFLARE_AUTH_TOKEN` - Enrichment credential
//! - `CLOUDFLARE_MODEL` - Enrichment model identifier
//! - `CLOUDFLARE_API_URL` - Enrichment API base URL
//! - `TASK_TRACKER_HOST` / `TASK_TRACKER_PORT` - HTTP listen address

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "gist-tasks.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Remote document (gist) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Identifier of the remote document.
    #[serde(default)]
    pub gist_id: Option<String>,

    /// Bearer credential with write access.
    #[serde(default)]
    pub token: Option<String>,

    /// Logical file inside the document that holds the task list.
    #[serde(default = "default_filename")]
    pub filename: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_gist_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            gist_id: None,
            token: None,
            filename: default_filename(),
            user_agent: default_user_agent(),
            api_url: default_gist_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_filename() -> String {
    "tasks.json".to_string()
}

fn default_user_agent() -> String {
    "task-tracker".to_string()
}

fn default_gist_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Text-generation enrichment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Set to false to never call the enrichment backend.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_cloudflare_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            account_id: None,
            auth_token: None,
            model: default_model(),
            api_url: default_cloudflare_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnrichmentConfig {
    /// Enrichment runs only when enabled and both credentials are present.
    pub fn is_active(&self) -> bool {
        self.enabled && non_empty(&self.account_id) && non_empty(&self.auth_token)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "@cf/openai/gpt-oss-20b".to_string()
}

fn default_cloudflare_api_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config file, load it (or defaults) and apply the process environment.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load_with_env(explicit: Option<&Path>) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::discover_file() {
                Some(path) => {
                    debug!("Using config file {}", path.display());
                    Self::load(path)?
                }
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// First existing config file among the implicit locations.
    fn discover_file() -> Option<PathBuf> {
        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Some(project);
        }
        dirs::home_dir()
            .map(|home| home.join(".gist-tasks").join("config.yaml"))
            .filter(|path| path.is_file())
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GIST_ID") {
            self.remote.gist_id = Some(v);
        }
        if let Some(v) = lookup("GIST_TOKEN") {
            self.remote.token = Some(v);
        }
        if let Some(v) = lookup("FILENAME") {
            self.remote.filename = v;
        }
        if let Some(v) = lookup("USER_AGENT") {
            self.remote.user_agent = v;
        }
        if let Some(v) = lookup("GIST_API_URL") {
            self.remote.api_url = v;
        }
        if let Some(v) = lookup("CLOUDFLARE_ACCOUNT_ID") {
            self.enrichment.account_id = Some(v);
        }
        if let Some(v) = lookup("CLOUDFLARE_AUTH_TOKEN") {
            self.enrichment.auth_token = Some(v);
        }
        if let Some(v) = lookup("CLOUDFLARE_MODEL") {
            self.enrichment.model = v;
        }
        if let Some(v) = lookup("CLOUDFLARE_API_URL") {
            self.enrichment.api_url = v;
        }
        if let Some(v) = lookup("TASK_TRACKER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("TASK_TRACKER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check that the remote document can be addressed and written.
    pub fn validate(&self) -> Result<()> {
        if !non_empty(&self.remote.gist_id) {
            bail!("remote document id is not configured (set GIST_ID or remote.gist_id)");
        }
        if !non_empty(&self.remote.token) {
            bail!("remote write credential is not configured (set GIST_TOKEN or remote.token)");
        }
        if self.remote.filename.trim().is_empty() {
            bail!("remote filename must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.remote.filename, "tasks.json");
        assert_eq!(config.remote.user_agent, "task-tracker");
        assert_eq!(config.remote.timeout_secs, 60);
        assert_eq!(config.enrichment.model, "@cf/openai/gpt-oss-20b");
        assert!(!config.enrichment.is_active());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("GIST_ID", "abc123"),
            ("GIST_TOKEN", "ghp_secret"),
            ("FILENAME", "todo.json"),
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("CLOUDFLARE_AUTH_TOKEN", "cf_secret"),
            ("TASK_TRACKER_PORT", "9100"),
        ]));

        assert_eq!(config.remote.gist_id.as_deref(), Some("abc123"));
        assert_eq!(config.remote.filename, "todo.json");
        assert_eq!(config.server.port, 9100);
        assert!(config.enrichment.is_active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("TASK_TRACKER_PORT", "not-a-port")]));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_enrichment_can_be_disabled() {
        let mut config = Config::default();
        config.enrichment.enabled = false;
        config.apply_env(env(&[
            ("CLOUDFLARE_ACCOUNT_ID", "acct"),
            ("CLOUDFLARE_AUTH_TOKEN", "cf_secret"),
        ]));
        assert!(!config.enrichment.is_active());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "remote:\n  gist_id: from-file\n  token: t\nenrichment:\n  enabled: false\n  timeout_secs: 5"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.remote.gist_id.as_deref(), Some("from-file"));
        assert_eq!(config.remote.filename, "tasks.json");
        assert!(!config.enrichment.enabled);
        assert_eq!(config.enrichment.timeout(), Duration::from_secs(5));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_blank_credentials_fail_validation() {
        let mut config = Config::default();
        config.apply_env(env(&[("GIST_ID", "abc"), ("GIST_TOKEN", "  ")]));
        assert!(config.validate().is_err());
    }
}
