// ABOUTME: Rollout orchestrator: redeploys a service's containers one at a time.
// ABOUTME: Each step is redeploy, wait for the replacement, then gate on its health check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::check::HttpCheck;
use super::error::DeployError;
use super::health::{HealthGate, ReadinessProbe};
use super::watcher::await_replacement;
use crate::cluster::{ClusterApi, RedeployOptions, Service};
use crate::config::RolloutConfig;
use crate::types::{ContainerId, ServiceId};

/// Pacing and budgets for one rollout.
#[derive(Debug, Clone)]
pub struct RolloutSettings {
    /// Pause between two containers.
    pub settle_delay: Duration,
    pub health_timeout: Duration,
    pub replacement_timeout: Duration,
    /// Container env entry holding the health check definition.
    pub check_env: String,
}

impl From<&RolloutConfig> for RolloutSettings {
    fn from(config: &RolloutConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            health_timeout: config.health_timeout,
            replacement_timeout: config.replacement_timeout,
            check_env: config.check_env.clone(),
        }
    }
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self::from(&RolloutConfig::default())
    }
}

/// One container swapped for a healthy replacement.
#[derive(Debug, Clone, Serialize)]
pub struct Replacement {
    pub name: String,
    pub old: ContainerId,
    pub new: ContainerId,
    pub health_attempts: u32,
}

/// Outcome of a completed rollout.
#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub service: String,
    pub service_id: ServiceId,
    pub gateway: String,
    pub gateway_container: ContainerId,
    pub replacements: Vec<Replacement>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives a rolling redeploy of one service.
pub struct Rollout<C: ?Sized, P> {
    cluster: Arc<C>,
    gate: HealthGate<P>,
    settings: RolloutSettings,
}

impl<C, P> Rollout<C, P>
where
    C: ClusterApi + ?Sized,
    P: ReadinessProbe,
{
    pub fn new(cluster: Arc<C>, gate: HealthGate<P>, settings: RolloutSettings) -> Self {
        Self {
            cluster,
            gate,
            settings,
        }
    }

    pub fn cluster(&self) -> &Arc<C> {
        &self.cluster
    }

    /// Redeploy every container of `service_name`, in inventory order.
    ///
    /// Stops at the first failing container; containers already replaced stay
    /// replaced.
    pub async fn rollout(
        &self,
        service_name: &str,
        gateway_name: &str,
    ) -> Result<RolloutReport, DeployError> {
        let started_at = Utc::now();

        let services = self.cluster.list_services().await?;
        let service_id = find_service(&services, service_name)?;
        let gateway_id = find_service(&services, gateway_name)?;

        let gateway = self.cluster.get_service(&gateway_id).await?;
        let gateway_container = gateway
            .containers
            .first()
            .cloned()
            .ok_or_else(|| DeployError::GatewayWithoutContainers(gateway_name.to_string()))?;

        let service = self.cluster.get_service(&service_id).await?;

        tracing::info!(
            service = %service.name,
            service_id = %service.id,
            gateway = gateway_name,
            gateway_id = %gateway_id,
            gateway_container = %gateway_container,
            containers = service.containers.len(),
            "redeploying service"
        );

        let mut replacements = Vec::with_capacity(service.containers.len());
        for (index, container_id) in service.containers.iter().enumerate() {
            if index > 0 && !self.settings.settle_delay.is_zero() {
                tokio::time::sleep(self.settings.settle_delay).await;
            }

            match self.redeploy_container(container_id, &service).await {
                Ok(replacement) => replacements.push(replacement),
                Err(e) => {
                    tracing::error!(
                        service = %service.name,
                        service_id = %service.id,
                        container = %container_id,
                        done = replacements.len(),
                        remaining = service.containers.len() - index,
                        error = %e,
                        "redeploy step failed, aborting rollout"
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(
            service = %service.name,
            service_id = %service.id,
            gateway = gateway_name,
            "successfully redeployed service"
        );

        Ok(RolloutReport {
            service: service.name,
            service_id: service.id,
            gateway: gateway_name.to_string(),
            gateway_container,
            replacements,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn redeploy_container(
        &self,
        container_id: &ContainerId,
        service: &Service,
    ) -> Result<Replacement, DeployError> {
        let container = self.cluster.get_container(container_id).await?;
        // Refuse before touching the container if readiness can't be verified.
        let check = HttpCheck::from_container(&container, &self.settings.check_env)?;

        tracing::info!(container = %container.id, name = %container.name, "redeploying container");

        // Subscribe first so the termination event cannot slip past.
        let events = self.cluster.subscribe_events().await?;
        self.cluster
            .redeploy(
                &container.id,
                RedeployOptions {
                    reuse_volumes: true,
                },
            )
            .await?;

        let replacement = tokio::time::timeout(
            self.settings.replacement_timeout,
            await_replacement(&*self.cluster, &container, &service.id, events),
        )
        .await
        .map_err(|_| DeployError::ReplacementTimeout {
            name: container.name.clone(),
            id: container.id.clone(),
            secs: self.settings.replacement_timeout.as_secs(),
        })??;

        let health_attempts = self
            .gate
            .await_healthy(&check.path, &replacement, self.settings.health_timeout)
            .await?;

        tracing::info!(
            container = %replacement.id,
            name = %replacement.name,
            attempts = health_attempts,
            "container checked ok"
        );

        Ok(Replacement {
            name: replacement.name,
            old: container.id,
            new: replacement.id,
            health_attempts,
        })
    }
}

fn find_service(services: &[Service], name: &str) -> Result<ServiceId, DeployError> {
    services
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.id.clone())
        .ok_or_else(|| DeployError::ServiceNotFound(name.to_string()))
}
