// ABOUTME: Cluster API error types.
// ABOUTME: thiserror for request failures, SNAFU for backend connection failures.

use snafu::Snafu;

/// Errors from cluster inventory, redeploy, and event feed operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("cluster API request failed: {0}")]
    Transport(String),

    #[error("event stream failed: {0}")]
    Stream(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}

/// Failure to reach the cluster backend at startup.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("failed to connect to docker at {endpoint}: {source}"))]
    Docker {
        endpoint: String,
        source: bollard::errors::Error,
    },
}
