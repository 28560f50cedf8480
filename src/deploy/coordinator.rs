// ABOUTME: Single-flight redeploy coordinator with one coalesced rerun.
// ABOUTME: Concurrent triggers collapse into the running rollout plus at most one follow-up.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;

use super::error::DeployError;
use super::health::ReadinessProbe;
use super::rollout::{Rollout, RolloutReport};
use crate::cluster::ClusterApi;

/// What a caller asked to have redeployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeployRequest {
    pub service: String,
    pub gateway: String,
}

impl RedeployRequest {
    pub fn new(service: impl Into<String>, gateway: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            gateway: gateway.into(),
        }
    }
}

/// Executes one full rollout.
#[async_trait]
pub trait RolloutRunner: Send + Sync + 'static {
    async fn run(&self, request: &RedeployRequest) -> Result<RolloutReport, DeployError>;
}

#[async_trait]
impl<C, P> RolloutRunner for Rollout<C, P>
where
    C: ClusterApi + ?Sized + 'static,
    P: ReadinessProbe + 'static,
{
    async fn run(&self, request: &RedeployRequest) -> Result<RolloutReport, DeployError> {
        self.rollout(&request.service, &request.gateway).await
    }
}

/// How a trigger was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This caller ran the rollout loop until no rerun was pending.
    Completed { runs: u32, failed: u32 },
    /// A rollout was in flight; a rerun was requested from it.
    Deferred,
    /// A rerun was already pending; nothing to do.
    AlreadyPending,
}

/// Process-wide single-flight coordinator for rollouts.
///
/// `running` is set for exactly the duration of one rollout, so at most one
/// rollout executes at a time. `rerun_requested` is a level, not a counter:
/// any number of triggers arriving during a rollout add up to one more run
/// after it. Both flags change only through the atomic helpers below.
///
/// A coalesced rerun repeats the request of the caller that holds the run.
pub struct RedeployCoordinator<R> {
    runner: R,
    running: AtomicBool,
    rerun_requested: AtomicBool,
}

/// Clears `running` when the claimed run ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl<R: RolloutRunner> RedeployCoordinator<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            running: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn rerun_requested(&self) -> bool {
        self.rerun_requested.load(Ordering::SeqCst)
    }

    /// Fire-and-forget trigger: schedules the request and returns at once.
    pub fn trigger(self: &Arc<Self>, request: RedeployRequest) -> JoinHandle<TriggerOutcome> {
        tracing::info!(service = %request.service, gateway = %request.gateway, "redeploy triggered");
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.request_redeploy(&request).await })
    }

    /// Run the rollout now, or record that it must run again afterwards.
    ///
    /// Errors from a run are logged, never returned: the caller has already
    /// been acknowledged. A failed or panicking run still honors a pending
    /// rerun.
    pub async fn request_redeploy(&self, request: &RedeployRequest) -> TriggerOutcome {
        if self.rerun_requested() && self.is_running() {
            tracing::info!(
                service = %request.service,
                "rollout in progress and rerun already registered"
            );
            return TriggerOutcome::AlreadyPending;
        }

        let mut runs = 0;
        let mut failed = 0;

        loop {
            let Some(guard) = self.try_claim() else {
                self.request_rerun();
                // The holder may have released between our claim and the request.
                if self.is_running() {
                    tracing::info!(
                        service = %request.service,
                        "rollout in progress, registered to run once again later"
                    );
                    return if runs == 0 {
                        TriggerOutcome::Deferred
                    } else {
                        TriggerOutcome::Completed { runs, failed }
                    };
                }
                // The holder released before seeing our flag: claim instead of
                // returning, or the request would be lost. A burst racing the
                // holder's release can therefore cost one run beyond two.
                continue;
            };

            // The run about to start satisfies every earlier request.
            self.rerun_requested.store(false, Ordering::SeqCst);

            runs += 1;
            let result = AssertUnwindSafe(self.runner.run(request))
                .catch_unwind()
                .await;
            drop(guard);

            match result {
                Ok(Ok(report)) => tracing::info!(
                    service = %report.service,
                    containers = report.replacements.len(),
                    run = runs,
                    "rollout finished"
                ),
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::error!(
                        service = %request.service,
                        gateway = %request.gateway,
                        run = runs,
                        kind = ?e.kind(),
                        "rollout failed: {}",
                        e
                    );
                }
                Err(panic) => {
                    failed += 1;
                    tracing::error!(
                        service = %request.service,
                        gateway = %request.gateway,
                        run = runs,
                        "rollout panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }

            if !self.take_rerun() {
                return TriggerOutcome::Completed { runs, failed };
            }
            tracing::info!(service = %request.service, "rollout done, running again");
        }
    }

    fn try_claim(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard {
                running: &self.running,
            })
    }

    fn request_rerun(&self) {
        self.rerun_requested.swap(true, Ordering::SeqCst);
    }

    fn take_rerun(&self) -> bool {
        self.rerun_requested
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
