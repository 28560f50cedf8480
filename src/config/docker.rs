// ABOUTME: Docker Engine connection settings for the cluster backend.
// ABOUTME: Socket path, service grouping label, and stop timeout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DockerConfig {
    /// Unix socket path; local defaults (DOCKER_HOST or /var/run/docker.sock) when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,

    /// Label whose value groups containers into a service.
    #[serde(default = "default_service_label")]
    pub service_label: String,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,
}

fn default_service_label() -> String {
    "com.docker.compose.service".to_string()
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for DockerConfig {
    fn default() -> Self {
        DockerConfig {
            socket: None,
            service_label: default_service_label(),
            stop_timeout: default_stop_timeout(),
        }
    }
}
