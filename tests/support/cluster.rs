// ABOUTME: In-memory ClusterApi double with a broadcast event feed.
// ABOUTME: Redeploys swap a container for a copy and publish the matching lifecycle events.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use seqredeploy::cluster::{
    ClusterApi, ClusterError, ClusterEvent, Container, EnvEntry, EventStream, LifecycleState,
    PortBinding, RedeployOptions, Service,
};
use seqredeploy::types::{ContainerId, ServiceId};
use tokio::time::Instant;

/// What the fake does after accepting a redeploy command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// Publish noise, the old container's termination, then the replacement starting.
    Normal,
    /// Publish a starting sibling before the termination as well.
    EarlySibling,
    /// Accept the command but never publish anything.
    Silent,
    /// Break the event feed right after the command.
    BrokenFeed,
}

type Subscriber = UnboundedSender<Result<ClusterEvent, ClusterError>>;

struct State {
    services: Vec<Service>,
    containers: HashMap<ContainerId, Container>,
    redeploys: Vec<(ContainerId, Instant)>,
    generation: u32,
    mode: ReplaceMode,
    inventory_down: bool,
}

pub struct FakeCluster {
    state: Mutex<State>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                services: Vec::new(),
                containers: HashMap::new(),
                redeploys: Vec::new(),
                generation: 0,
                mode: ReplaceMode::Normal,
                inventory_down: false,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a service whose id is `svc-<name>`, with containers in the given order.
    pub fn add_service(&self, name: &str, containers: Vec<Container>) -> ServiceId {
        let id = service_id(name);
        let mut state = self.state.lock();
        let ids = containers.iter().map(|c| c.id.clone()).collect();
        for container in containers {
            state.containers.insert(container.id.clone(), container);
        }
        state.services.push(Service {
            id: id.clone(),
            name: name.to_string(),
            containers: ids,
        });
        id
    }

    /// Make a container fetchable without attaching it to a service.
    pub fn insert_container(&self, container: Container) {
        self.state
            .lock()
            .containers
            .insert(container.id.clone(), container);
    }

    pub fn set_mode(&self, mode: ReplaceMode) {
        self.state.lock().mode = mode;
    }

    /// Make inventory calls fail with a transport error.
    pub fn set_inventory_down(&self, down: bool) {
        self.state.lock().inventory_down = down;
    }

    /// Containers redeployed so far, in command order.
    pub fn redeployed(&self) -> Vec<ContainerId> {
        self.state
            .lock()
            .redeploys
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// When each redeploy command arrived.
    pub fn redeploy_times(&self) -> Vec<Instant> {
        self.state.lock().redeploys.iter().map(|(_, at)| *at).collect()
    }

    /// Push an item to every live subscriber.
    pub fn publish(&self, item: Result<ClusterEvent, ClusterError>) {
        self.subscribers
            .lock()
            .retain(|tx| tx.unbounded_send(item.clone()).is_ok());
    }

    fn replace(&self, old: &Container, generation: u32) -> Container {
        let new = Container {
            id: ContainerId::new(format!("{}-r{}", old.id, generation)),
            ..old.clone()
        };

        let mut state = self.state.lock();
        state.containers.remove(&old.id);
        state.containers.insert(new.id.clone(), new.clone());
        for service in state.services.iter_mut() {
            for id in service.containers.iter_mut() {
                if *id == old.id {
                    *id = new.id.clone();
                }
            }
        }
        new
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_services(&self) -> Result<Vec<Service>, ClusterError> {
        let state = self.state.lock();
        if state.inventory_down {
            return Err(ClusterError::Transport("connection refused".to_string()));
        }
        Ok(state.services.clone())
    }

    async fn get_service(&self, id: &ServiceId) -> Result<Service, ClusterError> {
        self.state
            .lock()
            .services
            .iter()
            .find(|s| s.id == *id)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("service {}", id)))
    }

    async fn get_container(&self, id: &ContainerId) -> Result<Container, ClusterError> {
        self.state
            .lock()
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("container {}", id)))
    }

    async fn redeploy(&self, id: &ContainerId, _opts: RedeployOptions) -> Result<(), ClusterError> {
        let (old, generation, mode) = {
            let mut state = self.state.lock();
            let old = state
                .containers
                .get(id)
                .cloned()
                .ok_or_else(|| ClusterError::NotFound(format!("container {}", id)))?;
            state.redeploys.push((id.clone(), Instant::now()));
            state.generation += 1;
            (old, state.generation, state.mode)
        };

        let parents = vec![format!("/api/v1/service/{}/", old.service_id)];
        match mode {
            ReplaceMode::Silent => {}
            ReplaceMode::BrokenFeed => {
                self.publish(Err(ClusterError::Stream("connection reset".to_string())));
            }
            ReplaceMode::Normal | ReplaceMode::EarlySibling => {
                self.publish(Ok(ClusterEvent::container(
                    LifecycleState::Running,
                    "/api/v1/container/unrelated/",
                    vec!["/api/v1/service/svc-other/".to_string()],
                )));
                if mode == ReplaceMode::EarlySibling {
                    self.publish(Ok(ClusterEvent::container(
                        LifecycleState::Running,
                        "/api/v1/container/early-bird/",
                        parents.clone(),
                    )));
                }
                let new = self.replace(&old, generation);
                self.publish(Ok(ClusterEvent::container(
                    LifecycleState::Stopped,
                    format!("/api/v1/container/{}/", old.id),
                    parents.clone(),
                )));
                self.publish(Ok(ClusterEvent::container(
                    LifecycleState::Terminated,
                    format!("/api/v1/container/{}/", old.id),
                    parents.clone(),
                )));
                self.publish(Ok(ClusterEvent::container(
                    LifecycleState::Running,
                    format!("/api/v1/container/{}/", new.id),
                    parents,
                )));
            }
        }
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<EventStream, ClusterError> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        Ok(rx.boxed())
    }
}

pub fn service_id(name: &str) -> ServiceId {
    ServiceId::new(format!("svc-{}", name))
}

/// A container of `service` reachable at `ip:8080`, with an optional check definition.
pub fn container(id: &str, service: &str, ip: &str, check: Option<&str>) -> Container {
    Container {
        id: ContainerId::new(id),
        name: format!("{}-{}", service, id),
        service_id: service_id(service),
        private_ip: ip.to_string(),
        ports: vec![PortBinding {
            inner_port: 80,
            outer_port: 8080,
        }],
        env: check
            .map(|c| vec![EnvEntry::new("HTTP_CHECK", c)])
            .unwrap_or_default(),
    }
}
