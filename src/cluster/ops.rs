// ABOUTME: Cluster API trait consumed by the rollout core.
// ABOUTME: Inventory lookups, the redeploy command, and the live event feed.

use super::error::ClusterError;
use super::types::{ClusterEvent, Container, RedeployOptions, Service};
use crate::types::{ContainerId, ServiceId};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Live event feed. Events and transport errors arrive on the same stream, in order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ClusterEvent, ClusterError>> + Send>>;

/// Remote cluster-management operations.
///
/// Implementations are treated as stateless and safe to call concurrently.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every service known to the cluster.
    async fn list_services(&self) -> Result<Vec<Service>, ClusterError>;

    /// Fetch one service, including its container list.
    async fn get_service(&self, id: &ServiceId) -> Result<Service, ClusterError>;

    /// Fetch one container.
    async fn get_container(&self, id: &ContainerId) -> Result<Container, ClusterError>;

    /// Ask the cluster to replace a container with a fresh instance.
    async fn redeploy(&self, id: &ContainerId, opts: RedeployOptions)
    -> Result<(), ClusterError>;

    /// Open a subscription to the live event feed.
    ///
    /// The feed must already be receiving when this returns: events caused
    /// by a command issued afterwards have to show up on the stream even if
    /// it is not polled until the command completes.
    async fn subscribe_events(&self) -> Result<EventStream, ClusterError>;
}

/// Liveness check that round-trips the cluster API.
pub async fn service_count<C: ClusterApi + ?Sized>(cluster: &C) -> Result<usize, ClusterError> {
    cluster.list_services().await.map(|services| services.len())
}
