use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;
use crate::Status;

fn cleanup_all_health_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("HEALTH__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = HealthConfig::default();

    assert_eq!(config.server.listen_address, "127.0.0.1:50051");
    assert_eq!(config.watch.response_buffer_size, 4);
    assert_eq!(config.watch.max_subscribers_per_service, 0);
    assert_eq!(config.services.process_status, Status::Serving);
    assert!(config.services.initial_services.is_empty());
    assert!(!config.monitoring.prometheus_enabled);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_health_env_vars();
    with_vars(
        vec![
            ("HEALTH__WATCH__RESPONSE_BUFFER_SIZE", Some("16")),
            ("HEALTH__SERVER__LISTEN_ADDRESS", Some("0.0.0.0:6000")),
            ("HEALTH__SERVICES__PROCESS_STATUS", Some("not_serving")),
        ],
        || {
            let config = HealthConfig::new().unwrap();

            assert_eq!(config.watch.response_buffer_size, 16);
            assert_eq!(config.server.listen_address, "0.0.0.0:6000");
            assert_eq!(config.services.process_status, Status::NotServing);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_health_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("health.toml");
    std::fs::write(
        &config_path,
        r#"
        [services]
        initial_services = ["db", "cache"]

        [watch]
        max_subscribers_per_service = 8
        "#,
    )
    .unwrap();

    with_vars(vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))], || {
        let config = HealthConfig::new().unwrap().validate().unwrap();

        assert_eq!(config.services.initial_services, vec!["db".to_string(), "cache".to_string()]);
        assert_eq!(config.watch.max_subscribers_per_service, 8);
        // untouched sections keep their defaults
        assert_eq!(config.watch.response_buffer_size, 4);
    });
}

#[test]
#[serial]
fn with_override_config_should_let_environment_win() {
    cleanup_all_health_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [monitoring]
        prometheus_enabled = true
        prometheus_port = 9100

        [server]
        enable_compression = true
        "#,
    )
    .unwrap();

    with_vars(vec![("HEALTH__MONITORING__PROMETHEUS_PORT", Some("9200"))], || {
        let config = HealthConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert!(config.monitoring.prometheus_enabled);
        assert_eq!(config.monitoring.prometheus_port, 9200);
        assert!(config.server.enable_compression);
    });
}

#[test]
fn validate_rejects_unparsable_listen_address() {
    let mut config = HealthConfig::default();
    config.server.listen_address = "not-an-address".into();

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validate_rejects_keepalive_timeout_not_below_interval() {
    let mut config = HealthConfig::default();
    config.server.http2_keep_alive_interval_in_secs = 10;
    config.server.http2_keep_alive_timeout_in_secs = 10;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validate_rejects_zero_response_buffer() {
    let mut config = HealthConfig::default();
    config.watch.response_buffer_size = 0;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validate_rejects_empty_initial_service_name() {
    let mut config = HealthConfig::default();
    config.services.initial_services = vec!["db".into(), "".into()];

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validate_rejects_privileged_prometheus_port() {
    let mut config = HealthConfig::default();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 80;
    assert!(matches!(config.clone().validate(), Err(Error::Config(_))));

    config.monitoring.prometheus_port = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}
