// ABOUTME: RolloutRunner double that blocks on a semaphore until released.
// ABOUTME: Counts runs and tracks how many ever ran at the same time.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use seqredeploy::deploy::{DeployError, RedeployRequest, RolloutReport, RolloutRunner};
use seqredeploy::types::{ContainerId, ServiceId};
use tokio::sync::Semaphore;

pub struct GatedRunner {
    permits: Semaphore,
    runs: AtomicU32,
    active: AtomicU32,
    max_active: AtomicU32,
    /// Runs with these numbers (1-based) fail.
    failing_runs: Vec<u32>,
    /// Runs with these numbers (1-based) panic.
    panicking_runs: Vec<u32>,
}

impl GatedRunner {
    /// Every run blocks until `release` is called for it.
    pub fn gated() -> Self {
        Self::with_permits(0)
    }

    /// Runs complete immediately.
    pub fn open() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            permits: Semaphore::new(permits),
            runs: AtomicU32::new(0),
            active: AtomicU32::new(0),
            max_active: AtomicU32::new(0),
            failing_runs: Vec::new(),
            panicking_runs: Vec::new(),
        }
    }

    pub fn failing_on(mut self, runs: &[u32]) -> Self {
        self.failing_runs = runs.to_vec();
        self
    }

    pub fn panicking_on(mut self, runs: &[u32]) -> Self {
        self.panicking_runs = runs.to_vec();
        self
    }

    /// Let `n` more runs finish.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RolloutRunner for GatedRunner {
    async fn run(&self, request: &RedeployRequest) -> Result<RolloutReport, DeployError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        self.permits
            .acquire()
            .await
            .expect("semaphore is never closed")
            .forget();
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panicking_runs.contains(&run) {
            panic!("runner blew up on run {}", run);
        }
        if self.failing_runs.contains(&run) {
            return Err(DeployError::ServiceNotFound(request.service.clone()));
        }
        Ok(report(request))
    }
}

pub fn report(request: &RedeployRequest) -> RolloutReport {
    let now = Utc::now();
    RolloutReport {
        service: request.service.clone(),
        service_id: ServiceId::new(format!("svc-{}", request.service)),
        gateway: request.gateway.clone(),
        gateway_container: ContainerId::new("lb-1"),
        replacements: vec![],
        started_at: now,
        finished_at: now,
    }
}
