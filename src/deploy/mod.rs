// ABOUTME: Rolling redeploy core: coordinator, orchestrator, lifecycle watcher, health gate.
// ABOUTME: Exports the single-flight coordinator and the pieces it drives.

mod check;
mod coordinator;
mod error;
mod health;
mod rollout;
mod watcher;

pub use check::HttpCheck;
pub use coordinator::{RedeployCoordinator, RedeployRequest, RolloutRunner, TriggerOutcome};
pub use error::{DeployError, DeployErrorKind};
pub use health::{HealthGate, HttpProbe, ProbeError, ReadinessProbe};
pub use rollout::{Replacement, Rollout, RolloutReport, RolloutSettings};
pub use watcher::{ReplacementWatch, WatchState, await_replacement};
