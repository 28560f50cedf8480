// ABOUTME: Error types for rollout operations.
// ABOUTME: Covers name resolution, health check definitions, timeouts, and transport failures.

use crate::cluster::ClusterError;
use crate::types::ContainerId;

/// Errors that abort a rollout run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// No service with this name in the inventory.
    #[error("service {0} not found")]
    ServiceNotFound(String),

    /// The gateway service has no container to route through.
    #[error("gateway service {0} has no containers")]
    GatewayWithoutContainers(String),

    /// The container has no health check definition.
    #[error("container {name} ({id}) has no {key} health check definition")]
    MissingCheck {
        name: String,
        id: ContainerId,
        key: String,
    },

    /// The health check definition is not of the form `GET <path>`.
    #[error("container {name} ({id}) has unsupported health check '{definition}'")]
    UnsupportedCheck {
        name: String,
        id: ContainerId,
        definition: String,
    },

    /// The container publishes no port to probe.
    #[error("container {name} ({id}) publishes no port for health checks")]
    NoProbePort { name: String, id: ContainerId },

    /// Health gate gave up.
    #[error("container {name} ({id}): health check {url} timed out after {secs} seconds")]
    HealthCheckTimeout {
        name: String,
        id: ContainerId,
        url: String,
        secs: u64,
    },

    /// The replaced container never terminated, or no replacement appeared.
    #[error("container {name} ({id}) was not replaced within {secs} seconds")]
    ReplacementTimeout {
        name: String,
        id: ContainerId,
        secs: u64,
    },

    /// The event feed ended while waiting for a replacement.
    #[error("event stream closed while waiting for container {0} to be replaced")]
    EventStreamClosed(ContainerId),

    /// Cluster API failure.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Error classes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// A service, gateway, or container has no match.
    NotFound,
    /// Health check definition missing or not `GET <path>`.
    UnsupportedCheck,
    /// A bounded wait expired.
    Timeout,
    /// Cluster API or event stream I/O failure.
    Transport,
}

impl DeployError {
    /// Returns the error class for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::ServiceNotFound(_)
            | DeployError::GatewayWithoutContainers(_)
            | DeployError::NoProbePort { .. } => DeployErrorKind::NotFound,
            DeployError::MissingCheck { .. } | DeployError::UnsupportedCheck { .. } => {
                DeployErrorKind::UnsupportedCheck
            }
            DeployError::HealthCheckTimeout { .. } | DeployError::ReplacementTimeout { .. } => {
                DeployErrorKind::Timeout
            }
            DeployError::EventStreamClosed(_) => DeployErrorKind::Transport,
            DeployError::Cluster(e) if e.is_not_found() => DeployErrorKind::NotFound,
            DeployError::Cluster(_) => DeployErrorKind::Transport,
        }
    }
}
