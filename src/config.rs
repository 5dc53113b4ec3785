use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub github: GitHubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Public base URL of this deployment, used to build OAuth redirects.
    pub app_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding one subdirectory per persisted context.
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_oauth_base")]
    pub oauth_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            oauth_base: default_oauth_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_oauth_base() -> String {
    "https://github.com/login/oauth".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// OAuth application credentials, supplied via environment variables.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: std::env::var("GITHUB_CLIENT_ID")
                .context("GITHUB_CLIENT_ID environment variable not set")?,
            client_secret: std::env::var("GITHUB_CLIENT_SECRET")
                .context("GITHUB_CLIENT_SECRET environment variable not set")?,
        })
    }
}

/// Session-cookie signing key, supplied via environment variable.
pub fn session_secret_from_env() -> Result<String> {
    std::env::var("CTXM_SECRET_KEY").context("CTXM_SECRET_KEY environment variable not set")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate server
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }
    if config.server.app_url.trim().is_empty() {
        anyhow::bail!("server.app_url must not be empty");
    }

    // Validate github
    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be >= 1");
    }

    // Base URLs are joined with path fragments; trailing slashes would double up.
    config.server.app_url = config.server.app_url.trim_end_matches('/').to_string();
    config.github.api_base = config.github.api_base.trim_end_matches('/').to_string();
    config.github.oauth_base = config.github.oauth_base.trim_end_matches('/').to_string();

    Ok(config)
}
