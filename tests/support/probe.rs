// ABOUTME: Scripted ReadinessProbe for orchestrator and health gate tests.
// ABOUTME: Fails a fixed number of times or forever for chosen hosts, recording every call.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use seqredeploy::deploy::{ProbeError, ReadinessProbe};
use tokio::time::Instant;

#[derive(Default)]
pub struct ScriptedProbe {
    /// Answer 503 this many times before answering 200.
    failures_before_ready: AtomicU32,
    /// URLs containing one of these are never ready.
    never_ready: Vec<String>,
    /// URLs containing one of these fail at the transport level.
    unreachable: Vec<String>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedProbe {
    pub fn ready() -> Self {
        Self::default()
    }

    pub fn ready_after(failures: u32) -> Self {
        Self {
            failures_before_ready: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn never_ready_at(hosts: &[&str]) -> Self {
        Self {
            never_ready: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn unreachable_at(hosts: &[&str]) -> Self {
        Self {
            unreachable: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl ReadinessProbe for ScriptedProbe {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        self.calls.lock().push((url.to_string(), Instant::now()));

        if self.unreachable.iter().any(|h| url.contains(h.as_str())) {
            return Err(ProbeError::Connect("connection refused".to_string()));
        }
        if self.never_ready.iter().any(|h| url.contains(h.as_str())) {
            return Ok(500);
        }
        let pending = self
            .failures_before_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Ok(503);
        }
        Ok(200)
    }
}
