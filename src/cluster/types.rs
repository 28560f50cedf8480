// ABOUTME: Read-only snapshots of cluster resources and lifecycle events.
// ABOUTME: Service, Container, ClusterEvent, and redeploy options.

use crate::types::{ContainerId, ServiceId};
use serde::{Deserialize, Serialize};

/// A service and the containers it currently runs, in inventory order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub containers: Vec<ContainerId>,
}

/// A published port of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub inner_port: u16,
    pub outer_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
}

impl EnvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a `KEY=VALUE` entry. Entries without `=` have an empty value.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self::new(key, value),
            None => Self::new(raw, ""),
        }
    }
}

/// Snapshot of a single container.
///
/// A redeploy never mutates this: it produces a new container with a new
/// identifier under the same parent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub service_id: ServiceId,
    pub private_ip: String,
    pub ports: Vec<PortBinding>,
    pub env: Vec<EnvEntry>,
}

impl Container {
    /// Look up an environment entry by key.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// The first published host port, used as the readiness probe port.
    pub fn probe_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.outer_port)
    }
}

/// Kind of resource an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Service,
    Container,
    Other(String),
}

/// Lifecycle state reported by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Running,
    Stopped,
    Terminated,
    Other(String),
}

/// One record from the cluster's live event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub kind: ResourceKind,
    pub state: LifecycleState,
    /// Identifier or URI of the affected resource.
    pub resource: String,
    /// Identifiers or URIs of the resource's ancestors.
    pub parents: Vec<String>,
}

impl ClusterEvent {
    pub fn container(
        state: LifecycleState,
        resource: impl Into<String>,
        parents: Vec<String>,
    ) -> Self {
        Self {
            kind: ResourceKind::Container,
            state,
            resource: resource.into(),
            parents,
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind == ResourceKind::Container
    }

    /// Whether this event is about the resource with the given identifier.
    pub fn refers_to(&self, id: &str) -> bool {
        uri_names(&self.resource, id)
    }

    /// Whether any ancestor of the resource has the given identifier.
    pub fn has_parent(&self, id: &str) -> bool {
        self.parents.iter().any(|parent| uri_names(parent, id))
    }

    /// The identifier of the affected resource (last path segment of a URI).
    pub fn resource_id(&self) -> &str {
        self.resource
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.resource)
    }
}

/// A bare id matches itself; a URI matches when one of its path segments is the id.
fn uri_names(uri: &str, id: &str) -> bool {
    !id.is_empty() && (uri == id || uri.split('/').any(|segment| segment == id))
}

/// Options for the redeploy command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedeployOptions {
    /// Carry the old container's data volumes over to its replacement.
    pub reuse_volumes: bool,
}
