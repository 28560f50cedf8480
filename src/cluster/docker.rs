// ABOUTME: Bollard-based cluster backend over the Docker Engine API.
// ABOUTME: Groups containers into services by label and maps Docker events to ClusterEvents.

use super::error::{ClusterError, ConnectError, DockerSnafu};
use super::ops::{ClusterApi, EventStream};
use super::types::{
    ClusterEvent, Container, EnvEntry, LifecycleState, PortBinding, RedeployOptions,
    ResourceKind, Service,
};
use crate::config::DockerConfig;
use crate::types::{ContainerId, ServiceId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, ContainerInspectResponse, EndpointSettings, EventMessage,
    EventMessageTypeEnum, NetworkingConfig,
};
use bollard::query_parameters::{
    CreateContainerOptions, EventsOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use chrono::Utc;
use futures::StreamExt;
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_not_found_error(e: bollard::errors::Error, what: &str) -> ClusterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ClusterError::NotFound(what.to_string())
        }
        _ => ClusterError::Transport(format!("{}: {}", what, e)),
    }
}

fn map_transport_error(e: bollard::errors::Error) -> ClusterError {
    ClusterError::Transport(e.to_string())
}

// =============================================================================
// DockerCluster
// =============================================================================

/// Cluster backend for a single Docker Engine.
///
/// A service is the set of running containers sharing a value of the
/// configured service label (Compose's `com.docker.compose.service` by
/// default). The label value doubles as service id and name.
pub struct DockerCluster {
    client: Docker,
    service_label: String,
    stop_timeout: Duration,
}

impl DockerCluster {
    /// Create a DockerCluster from an existing client.
    pub fn new(client: Docker, config: &DockerConfig) -> Self {
        Self {
            client,
            service_label: config.service_label.clone(),
            stop_timeout: config.stop_timeout,
        }
    }

    /// Connect using the configured socket, or local defaults.
    pub fn connect(config: &DockerConfig) -> Result<Self, ConnectError> {
        let client = match &config.socket {
            Some(socket) => Docker::connect_with_unix(socket, 120, bollard::API_DEFAULT_VERSION)
                .context(DockerSnafu {
                    endpoint: socket.clone(),
                })?,
            None => Docker::connect_with_local_defaults().context(DockerSnafu {
                endpoint: "local defaults".to_string(),
            })?,
        };
        Ok(Self::new(client, config))
    }

    fn label_filter(&self, value: Option<&str>) -> HashMap<String, Vec<String>> {
        let label = match value {
            Some(v) => format!("{}={}", self.service_label, v),
            None => self.service_label.clone(),
        };
        HashMap::from([("label".to_string(), vec![label])])
    }

    /// Running containers carrying the service label, as (name, id, label value).
    async fn labelled_containers(
        &self,
        value: Option<&str>,
    ) -> Result<Vec<(String, String, String)>, ClusterError> {
        let opts = ListContainersOptions {
            all: false,
            filters: Some(self.label_filter(value)),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(map_transport_error)?;

        let mut entries: Vec<(String, String, String)> = containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let service = c.labels.as_ref()?.get(&self.service_label)?.clone();
                let name = c
                    .names
                    .as_ref()
                    .and_then(|n| n.first())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_else(|| id.clone());
                Some((name, id, service))
            })
            .collect();

        // Docker lists newest first; name order gives a stable rollout order.
        entries.sort();
        Ok(entries)
    }

    fn to_container(&self, details: ContainerInspectResponse) -> Container {
        let id = details.id.clone().unwrap_or_default();
        let config = details.config.as_ref();

        let service_id = config
            .and_then(|c| c.labels.as_ref())
            .and_then(|labels| labels.get(&self.service_label))
            .cloned()
            .unwrap_or_default();

        let env = config
            .and_then(|c| c.env.as_ref())
            .map(|entries| entries.iter().map(|e| EnvEntry::parse(e)).collect())
            .unwrap_or_default();

        let private_ip = details
            .network_settings
            .as_ref()
            .and_then(|s| s.networks.as_ref())
            .and_then(|nets| {
                let mut names: Vec<&String> = nets.keys().collect();
                names.sort();
                names
                    .into_iter()
                    .filter_map(|name| nets.get(name))
                    .filter_map(|endpoint| endpoint.ip_address.clone())
                    .find(|ip| !ip.is_empty())
            })
            .unwrap_or_default();

        let mut ports: Vec<PortBinding> = details
            .network_settings
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .map(|map| {
                map.iter()
                    .filter_map(|(key, bindings)| {
                        let inner_port = key.split('/').next()?.parse().ok()?;
                        let outer_port = bindings
                            .as_ref()?
                            .iter()
                            .find_map(|b| b.host_port.as_ref()?.parse().ok())?;
                        Some(PortBinding {
                            inner_port,
                            outer_port,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        ports.sort_by_key(|p| p.inner_port);

        Container {
            id: ContainerId::new(id),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            service_id: ServiceId::new(service_id),
            private_ip,
            ports,
            env,
        }
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerInspectResponse, ClusterError> {
        self.client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_not_found_error(e, &format!("container {}", id)))
    }

    /// Build a create request that reproduces an inspected container.
    fn recreate_body(details: &ContainerInspectResponse) -> ContainerCreateBody {
        let config = details.config.clone().unwrap_or_default();
        let host_config = details.host_config.clone();

        let exposed_ports = host_config
            .as_ref()
            .and_then(|h| h.port_bindings.as_ref())
            .map(|bindings| bindings.keys().cloned().collect::<Vec<String>>())
            .filter(|ports| !ports.is_empty());

        // Re-attach to the same networks with the same aliases so discovery keeps working.
        let networking_config = details
            .network_settings
            .as_ref()
            .and_then(|s| s.networks.as_ref())
            .map(|nets| {
                let endpoints: HashMap<String, EndpointSettings> = nets
                    .iter()
                    .map(|(name, endpoint)| {
                        (
                            name.clone(),
                            EndpointSettings {
                                aliases: endpoint.aliases.clone(),
                                ..Default::default()
                            },
                        )
                    })
                    .collect();
                NetworkingConfig {
                    endpoints_config: Some(endpoints),
                }
            });

        ContainerCreateBody {
            image: config.image,
            env: config.env,
            labels: config.labels,
            cmd: config.cmd,
            entrypoint: config.entrypoint,
            working_dir: config.working_dir,
            user: config.user,
            healthcheck: config.healthcheck,
            stop_signal: config.stop_signal,
            stop_timeout: config.stop_timeout,
            exposed_ports,
            host_config,
            networking_config,
            ..Default::default()
        }
    }
}

/// Map a Docker event to the cluster event model.
///
/// `destroy` is the point where the old container is fully gone, so it is the
/// Terminated state; `die`/`stop`/`kill` only mean the process exited.
pub(crate) fn map_event(message: EventMessage, service_label: &str) -> ClusterEvent {
    let kind = match message.typ {
        Some(EventMessageTypeEnum::CONTAINER) => ResourceKind::Container,
        Some(EventMessageTypeEnum::SERVICE) => ResourceKind::Service,
        other => ResourceKind::Other(other.map(|t| t.to_string()).unwrap_or_default()),
    };

    let action = message.action.unwrap_or_default();
    let state = match action.as_str() {
        "start" => LifecycleState::Running,
        "destroy" => LifecycleState::Terminated,
        "die" | "stop" | "kill" => LifecycleState::Stopped,
        _ => LifecycleState::Other(action),
    };

    let (resource, parents) = match message.actor {
        Some(actor) => {
            let parents = actor
                .attributes
                .as_ref()
                .and_then(|attrs| attrs.get(service_label))
                .map(|service| vec![service.clone()])
                .unwrap_or_default();
            (actor.id.unwrap_or_default(), parents)
        }
        None => (String::new(), Vec::new()),
    };

    ClusterEvent {
        kind,
        state,
        resource,
        parents,
    }
}

#[async_trait]
impl ClusterApi for DockerCluster {
    async fn list_services(&self) -> Result<Vec<Service>, ClusterError> {
        let mut services: Vec<Service> = Vec::new();

        for (_, id, label) in self.labelled_containers(None).await? {
            match services.iter_mut().find(|s| s.name == label) {
                Some(service) => service.containers.push(ContainerId::new(id)),
                None => services.push(Service {
                    id: ServiceId::new(label.clone()),
                    name: label,
                    containers: vec![ContainerId::new(id)],
                }),
            }
        }

        Ok(services)
    }

    async fn get_service(&self, id: &ServiceId) -> Result<Service, ClusterError> {
        let containers: Vec<ContainerId> = self
            .labelled_containers(Some(id.as_str()))
            .await?
            .into_iter()
            .map(|(_, container_id, _)| ContainerId::new(container_id))
            .collect();

        if containers.is_empty() {
            return Err(ClusterError::NotFound(format!("service {}", id)));
        }

        Ok(Service {
            id: id.clone(),
            name: id.to_string(),
            containers,
        })
    }

    async fn get_container(&self, id: &ContainerId) -> Result<Container, ClusterError> {
        let details = self.inspect(id).await?;
        Ok(self.to_container(details))
    }

    async fn redeploy(&self, id: &ContainerId, opts: RedeployOptions) -> Result<(), ClusterError> {
        let details = self.inspect(id).await?;
        let name = details
            .name
            .clone()
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();
        let body = Self::recreate_body(&details);

        tracing::debug!(container = %id, %name, "stopping container for redeploy");
        let stop_opts = StopContainerOptions {
            t: Some(stop_timeout_secs(self.stop_timeout)),
            signal: None,
        };
        if let Err(e) = self.client.stop_container(id.as_str(), Some(stop_opts)).await {
            // Already stopped is fine; removal below is forced anyway.
            tracing::debug!(container = %id, "stop before redeploy failed: {}", e);
        }

        let remove_opts = RemoveContainerOptions {
            force: true,
            v: !opts.reuse_volumes,
            ..Default::default()
        };
        self.client
            .remove_container(id.as_str(), Some(remove_opts))
            .await
            .map_err(|e| map_not_found_error(e, &format!("container {}", id)))?;

        let image = body.image.clone();
        let create_opts = CreateContainerOptions {
            name: Some(name.clone()),
            ..Default::default()
        };
        let created = self
            .client
            .create_container(Some(create_opts), body)
            .await
            .map_err(|e| recreate_failed(&name, image.as_deref(), e))?;

        self.client
            .start_container(&created.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| recreate_failed(&name, image.as_deref(), e))?;

        tracing::debug!(old = %id, new = %created.id, %name, "container recreated");
        Ok(())
    }

    /// Opens the `/events` request before returning.
    ///
    /// bollard only sends the request once its stream is polled, so a task
    /// pumps the feed into a channel from the start. `since` makes Docker
    /// replay anything emitted between this call and the request going out.
    async fn subscribe_events(&self) -> Result<EventStream, ClusterError> {
        let filters = HashMap::from([(
            "type".to_string(),
            vec!["container".to_string()],
        )]);
        let opts = EventsOptions {
            since: Some(Utc::now().timestamp().to_string()),
            filters: Some(filters),
            ..Default::default()
        };

        let service_label = self.service_label.clone();
        let mut events = Box::pin(self.client.events(Some(opts)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    item = events.next() => {
                        let Some(item) = item else { break };
                        let item = item
                            .map(|message| map_event(message, &service_label))
                            .map_err(|e| ClusterError::Stream(e.to_string()));
                        if tx.send(item).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("docker event subscription closed");
        });

        Ok(Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx))))
    }
}

/// Docker takes the stop timeout as whole seconds in an `i32`.
fn stop_timeout_secs(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX)
}

/// Creating or starting the replacement failed after the old container was removed.
fn recreate_failed(name: &str, image: Option<&str>, e: bollard::errors::Error) -> ClusterError {
    let image = image.unwrap_or("<unknown image>");
    tracing::error!(
        %name,
        %image,
        "container was removed but could not be recreated, restore it by hand: {}",
        e
    );
    ClusterError::Transport(format!(
        "container {} (image {}) was removed and could not be recreated: {}",
        name, image, e
    ))
}
