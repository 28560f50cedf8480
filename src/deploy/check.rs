// ABOUTME: Parsing of a container's declared HTTP health check.
// ABOUTME: Only the `GET <path>` form is supported; anything else is refused.

use super::error::DeployError;
use crate::cluster::Container;

/// A readiness check the health gate knows how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCheck {
    pub path: String,
}

impl HttpCheck {
    /// Parse a definition such as `GET /health`.
    ///
    /// Returns `None` for any other method or when the path is missing.
    pub fn parse(definition: &str) -> Option<Self> {
        let mut parts = definition.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("GET"), Some(path)) => Some(Self {
                path: path.to_string(),
            }),
            _ => None,
        }
    }

    /// Read and parse the check declared in the container's env entry `key`.
    pub fn from_container(container: &Container, key: &str) -> Result<Self, DeployError> {
        let definition = container
            .env_var(key)
            .ok_or_else(|| DeployError::MissingCheck {
                name: container.name.clone(),
                id: container.id.clone(),
                key: key.to_string(),
            })?;

        Self::parse(definition).ok_or_else(|| DeployError::UnsupportedCheck {
            name: container.name.clone(),
            id: container.id.clone(),
            definition: definition.to_string(),
        })
    }
}
