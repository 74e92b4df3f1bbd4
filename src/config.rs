//! Configuration for the relay: the TOML file format and its loader.

use std::{path::Path, sync::Arc};

use eyre::WrapErr as _;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::fs;

/// Root config structure: HTTP server settings and the upstream OBS endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// HTTP server binding configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream obs-websocket endpoint and credential.
    pub obs: ObsConfig,
}

/// HTTP server binding configuration section.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// TCP port for the browser-facing WebSocket endpoint.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Optional directory of static web UI assets. When omitted no assets
    /// are served and only `/ws` is exposed.
    #[serde(default)]
    pub assets_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            assets_dir: None,
        }
    }
}

/// Upstream obs-websocket connection parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct ObsConfig {
    /// Host the OBS instance listens on.
    #[serde(default = "default_obs_host")]
    pub host: String,
    /// obs-websocket port.
    #[serde(default = "default_obs_port")]
    pub port: u16,
    /// Shared secret for the obs-websocket authentication challenge.
    pub password: Arc<SecretString>,
}

fn default_port() -> u16 {
    4085
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_obs_host() -> String {
    "127.0.0.1".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

/// Reads and parses the relay config from a TOML file.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<RelayConfig> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(&path).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    let config: RelayConfig = toml::from_str(&content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        path_ref.display()
    ))?;
    Ok(config)
}
