// ABOUTME: Configuration types and parsing for seqredeploy.yml.
// ABOUTME: Handles YAML parsing, env-backed secrets, and defaults when no file exists.

mod docker;
mod env_value;
mod init;
mod rollout;

pub use docker::DockerConfig;
pub use env_value::EnvValue;
pub use init::init_config;
pub use rollout::RolloutConfig;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

pub const CONFIG_FILENAME: &str = "seqredeploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "seqredeploy.yaml";

pub const SECRET_ENV: &str = "SEQREDEPLOY_SECRET";
pub const PROBE_HOST_ENV: &str = "SEQREDEPLOY_HOSTIP";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_secret")]
    pub secret: EnvValue,

    #[serde(default = "default_probe_host")]
    pub probe_host: EnvValue,

    #[serde(default)]
    pub rollout: RolloutConfig,

    #[serde(default)]
    pub docker: DockerConfig,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_secret() -> EnvValue {
    EnvValue::from_env(SECRET_ENV)
}

fn default_probe_host() -> EnvValue {
    EnvValue::from_env(PROBE_HOST_ENV)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: default_listen(),
            secret: default_secret(),
            probe_host: default_probe_host(),
            rollout: RolloutConfig::default(),
            docker: DockerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the config file from `dir`, or fall back to defaults.
    ///
    /// The service is usually configured purely through the environment, so
    /// a missing file is not an error.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// The shared request secret, if one is configured.
    pub fn request_secret(&self) -> Option<String> {
        self.secret.resolve_optional()
    }

    /// Override for the readiness probe host, if one is configured.
    pub fn probe_host(&self) -> Option<String> {
        self.probe_host.resolve_optional()
    }
}
