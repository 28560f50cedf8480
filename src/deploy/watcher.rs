// ABOUTME: Lifecycle watcher that spots a redeployed container's replacement.
// ABOUTME: Filters the shared event feed for "old terminated" then "sibling running".

use futures::StreamExt;

use super::error::DeployError;
use crate::cluster::{ClusterApi, ClusterEvent, Container, EventStream, LifecycleState};
use crate::types::{ContainerId, ServiceId};

/// Where the watch is in the terminate-then-reappear sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    WaitingForTermination,
    WaitingForReappearance,
}

/// Pure state machine over cluster events.
///
/// The feed is shared by every service on the cluster and arrives unordered
/// with respect to unrelated resources, so matching is by identity (for the
/// termination) and by ancestry (for the replacement) only.
#[derive(Debug)]
pub struct ReplacementWatch<'a> {
    old: &'a ContainerId,
    parent: &'a ServiceId,
    state: WatchState,
}

impl<'a> ReplacementWatch<'a> {
    pub fn new(old: &'a ContainerId, parent: &'a ServiceId) -> Self {
        Self {
            old,
            parent,
            state: WatchState::WaitingForTermination,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Feed one event. Returns the replacement's id once it is running.
    pub fn observe(&mut self, event: &ClusterEvent) -> Option<ContainerId> {
        if !event.is_container() {
            return None;
        }

        match self.state {
            WatchState::WaitingForTermination => {
                if event.state == LifecycleState::Terminated && event.refers_to(self.old.as_str())
                {
                    tracing::debug!(container = %self.old, "old container terminated");
                    self.state = WatchState::WaitingForReappearance;
                }
                None
            }
            WatchState::WaitingForReappearance => {
                if event.state == LifecycleState::Running && event.has_parent(self.parent.as_str())
                {
                    Some(ContainerId::new(event.resource_id()))
                } else {
                    None
                }
            }
        }
    }
}

/// Wait for `old` to terminate and a new container of `parent` to start running.
///
/// The first running sibling after the termination is taken as the
/// replacement. Any error on the feed ends the wait immediately. No timeout
/// is applied here; callers bound the wait.
pub async fn await_replacement<C: ClusterApi + ?Sized>(
    cluster: &C,
    old: &Container,
    parent: &ServiceId,
    mut events: EventStream,
) -> Result<Container, DeployError> {
    let mut watch = ReplacementWatch::new(&old.id, parent);

    while let Some(item) = events.next().await {
        let event = item?;
        if let Some(new_id) = watch.observe(&event) {
            let replacement = cluster.get_container(&new_id).await?;
            tracing::info!(
                old = %old.id,
                new = %replacement.id,
                name = %replacement.name,
                "replacement container is running"
            );
            return Ok(replacement);
        }
    }

    Err(DeployError::EventStreamClosed(old.id.clone()))
}
