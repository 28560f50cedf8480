// ABOUTME: Cluster API boundary: data model, trait, and the Docker backend.
// ABOUTME: The rollout core only talks to the cluster through ClusterApi.

mod docker;
mod error;
mod ops;
mod types;

pub use docker::DockerCluster;
pub use error::{ClusterError, ConnectError};
pub use ops::{ClusterApi, EventStream, service_count};
pub use types::{
    ClusterEvent, Container, EnvEntry, LifecycleState, PortBinding, RedeployOptions,
    ResourceKind, Service,
};
