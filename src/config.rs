//! Configuration management for powledger

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            bootstrap_peers: Vec::new(),
            peer_timeout_secs: default_peer_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Receiver of mining rewards; a random identifier is generated when unset.
    #[serde(default)]
    pub node_identifier: Option<String>,
    #[serde(default = "default_reward")]
    pub reward: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            node_identifier: None,
            reward: default_reward(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsensusConfig {
    /// Seconds between background resolutions. Zero resolves only on demand.
    #[serde(default)]
    pub interval_secs: u64,
}

fn default_api_port() -> u16 {
    5001
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_peer_timeout() -> u64 {
    10
}

fn default_threads() -> usize {
    1
}

fn default_reward() -> f64 {
    1.0
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.miner.threads == 0 {
            return Err(ChainError::ConfigError(
                "miner.threads must be at least 1".to_string(),
            ));
        }

        if self.network.peer_timeout_secs == 0 {
            return Err(ChainError::ConfigError(
                "network.peer_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(id) = &self.miner.node_identifier {
            if id.trim().is_empty() {
                return Err(ChainError::ConfigError(
                    "miner.node_identifier must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from `path`, falling back to defaults when the file is absent.
/// The `PORT` environment variable overrides `network.api_port`.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        Config::from_toml_str(&config_str)?
    };

    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        config.network.api_port = port;
    }

    Ok(config)
}
