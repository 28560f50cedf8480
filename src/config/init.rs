// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates seqredeploy.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::default());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"listen: "{}"
# Shared secret expected in the `secret` query parameter.
secret:
  env: SEQREDEPLOY_SECRET
# Address used for readiness checks instead of the container's private IP.
probe_host:
  env: SEQREDEPLOY_HOSTIP
rollout:
  settle_delay: {}s
  health_interval: {}s
  health_timeout: {}s
  replacement_timeout: {}s
  check_env: {}
docker:
  service_label: {}
"#,
        config.listen,
        config.rollout.settle_delay.as_secs(),
        config.rollout.health_interval.as_secs(),
        config.rollout.health_timeout.as_secs(),
        config.rollout.replacement_timeout.as_secs(),
        config.rollout.check_env,
        config.docker.service_label,
    )
}
