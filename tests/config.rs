// ABOUTME: Integration tests for configuration parsing, discovery, and scaffolding.
// ABOUTME: Covers YAML durations, defaults, env-backed secrets, and init.

use seqredeploy::config::*;
use seqredeploy::error::Error;
use std::fs;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_mapping_gives_defaults() {
        let config = Config::from_yaml("{}").unwrap();

        assert_eq!(config.listen.to_string(), "0.0.0.0:8080");
        assert_eq!(config.secret, EnvValue::from_env(SECRET_ENV));
        assert_eq!(config.probe_host, EnvValue::from_env(PROBE_HOST_ENV));
        assert_eq!(config.rollout.settle_delay, Duration::from_secs(25));
        assert_eq!(config.rollout.health_interval, Duration::from_secs(5));
        assert_eq!(config.rollout.health_timeout, Duration::from_secs(600));
        assert_eq!(config.rollout.replacement_timeout, Duration::from_secs(600));
        assert_eq!(config.rollout.check_env, "HTTP_CHECK");
        assert_eq!(config.docker.service_label, "com.docker.compose.service");
        assert_eq!(config.docker.socket, None);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
listen: "127.0.0.1:9000"
secret: hunter2
probe_host:
  env: MY_HOST_IP
  default: 172.17.0.1
rollout:
  settle_delay: 1m 30s
  health_interval: 500ms
  health_timeout: 2m
  replacement_timeout: 45s
  request_timeout: 3s
  check_env: READY_CHECK
docker:
  socket: /run/user/1000/docker.sock
  service_label: app.service
  stop_timeout: 30s
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.secret, EnvValue::Literal("hunter2".to_string()));
        assert_eq!(config.rollout.settle_delay, Duration::from_secs(90));
        assert_eq!(config.rollout.health_interval, Duration::from_millis(500));
        assert_eq!(config.rollout.health_timeout, Duration::from_secs(120));
        assert_eq!(config.rollout.replacement_timeout, Duration::from_secs(45));
        assert_eq!(config.rollout.request_timeout, Duration::from_secs(3));
        assert_eq!(config.rollout.check_env, "READY_CHECK");
        assert_eq!(
            config.docker.socket.as_deref(),
            Some("/run/user/1000/docker.sock")
        );
        assert_eq!(config.docker.service_label, "app.service");
        assert_eq!(config.docker.stop_timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_duration_is_rejected() {
        let result = Config::from_yaml("rollout:\n  settle_delay: soon\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        assert!(Config::from_yaml("listen: not-an-address\n").is_err());
    }
}

mod environment {
    use super::*;

    #[test]
    fn secret_comes_from_the_environment_by_default() {
        temp_env::with_var(SECRET_ENV, Some("from-env"), || {
            let config = Config::default();
            assert_eq!(config.request_secret().as_deref(), Some("from-env"));
        });
    }

    #[test]
    fn unset_or_empty_secret_is_absent() {
        temp_env::with_var_unset(SECRET_ENV, || {
            assert_eq!(Config::default().request_secret(), None);
        });
        temp_env::with_var(SECRET_ENV, Some(""), || {
            assert_eq!(Config::default().request_secret(), None);
        });
    }

    #[test]
    fn probe_host_falls_back_to_its_default() {
        let yaml = "probe_host:\n  env: SEQREDEPLOY_TEST_HOST\n  default: 172.17.0.1\n";
        temp_env::with_var_unset("SEQREDEPLOY_TEST_HOST", || {
            let config = Config::from_yaml(yaml).unwrap();
            assert_eq!(config.probe_host().as_deref(), Some("172.17.0.1"));
        });
        temp_env::with_var("SEQREDEPLOY_TEST_HOST", Some("10.1.1.1"), || {
            let config = Config::from_yaml(yaml).unwrap();
            assert_eq!(config.probe_host().as_deref(), Some("10.1.1.1"));
        });
    }
}

mod files {
    use super::*;

    #[test]
    fn discover_without_a_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.listen.port(), 8080);
    }

    #[test]
    fn discover_finds_the_alternate_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "listen: \"127.0.0.1:7000\"\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.listen.port(), 7000);
    }

    #[test]
    fn load_of_a_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("nope.yml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn init_writes_a_loadable_template() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.rollout.settle_delay, Duration::from_secs(25));
        assert_eq!(config.secret, EnvValue::from_env(SECRET_ENV));
    }

    #[test]
    fn init_respects_existing_files_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "listen: \"127.0.0.1:7000\"\n").unwrap();

        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(fs::read_to_string(&path).unwrap().contains("7000"));

        init_config(dir.path(), true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("0.0.0.0:8080"));
    }
}
