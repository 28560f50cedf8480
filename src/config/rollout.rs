// ABOUTME: Rollout pacing and health gate configuration.
// ABOUTME: Defines settle delay, probe interval, and wait budgets with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RolloutConfig {
    /// Pause between two containers of the same service.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub health_interval: Duration,

    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    /// Bound on the terminate-then-reappear wait after a redeploy command.
    #[serde(default = "default_replacement_timeout", with = "humantime_serde")]
    pub replacement_timeout: Duration,

    /// Timeout for a single readiness request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Container env entry holding the `GET <path>` check definition.
    #[serde(default = "default_check_env")]
    pub check_env: String,
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(25)
}

fn default_health_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_replacement_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_check_env() -> String {
    "HTTP_CHECK".to_string()
}

impl Default for RolloutConfig {
    fn default() -> Self {
        RolloutConfig {
            settle_delay: default_settle_delay(),
            health_interval: default_health_interval(),
            health_timeout: default_health_timeout(),
            replacement_timeout: default_replacement_timeout(),
            request_timeout: default_request_timeout(),
            check_env: default_check_env(),
        }
    }
}
