//! Unit tests for configuration
//!
//! Defaults, TOML parsing, validation, and file loading.

use hostboot::config::{HostBootConfig, PollingConfig, DEFAULT_API_BASE_URL};
use hostboot::error::HostBootError;
use hostboot::retry::RetryPolicy;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = HostBootConfig::default();
    assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.polling.interval(), Duration::from_secs(3));
    assert_eq!(config.polling.registration_timeout(), Duration::from_secs(120));
    assert_eq!(config.polling.bootstrap_timeout(), Duration::from_secs(600));
    assert_eq!(config.retry.max_retries, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = HostBootConfig::from_toml(
        r#"
[api]
base_url = "https://ambari.example.com:8443/api/v1"

[polling]
registration_timeout_secs = 300
"#,
    )
    .unwrap();
    assert_eq!(config.api.base_url, "https://ambari.example.com:8443/api/v1");
    assert_eq!(config.api.connect_timeout_secs, 10);
    assert_eq!(config.polling.registration_timeout_secs, 300);
    assert_eq!(config.polling.interval_secs, 3);
    assert_eq!(config.retry.initial_backoff_ms, 1000);
}

#[test]
fn test_polling_section_deserialize() {
    let polling: PollingConfig = toml::from_str("interval_secs = 1").unwrap();
    assert_eq!(polling.interval(), Duration::from_secs(1));
    assert_eq!(polling.registration_timeout_secs, 120);
}

#[test]
fn test_validation_rejects_bad_values() {
    for bad in [
        "[polling]\ninterval_secs = 0",
        "[polling]\nregistration_timeout_secs = 0",
        "[polling]\nbootstrap_timeout_secs = 0",
        "[api]\nbase_url = \"  \"",
        "[retry]\ninitial_backoff_ms = 5000\nmax_backoff_ms = 1000",
    ] {
        let result = HostBootConfig::from_toml(bad);
        assert!(
            matches!(result, Err(HostBootError::Config(_))),
            "accepted: {}",
            bad
        );
    }
}

#[test]
fn test_invalid_toml() {
    assert!(matches!(
        HostBootConfig::from_toml("[polling\ninterval_secs = 3"),
        Err(HostBootError::Config(_))
    ));
}

#[test]
fn test_load_explicit_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("hostboot.toml");
    std::fs::write(&path, "[retry]\nmax_retries = 7\n").unwrap();

    let config = HostBootConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.retry.max_retries, 7);

    let missing = temp_dir.path().join("missing.toml");
    assert!(matches!(
        HostBootConfig::load(Some(missing.as_path())),
        Err(HostBootError::Config(_))
    ));
}

#[test]
fn test_retry_policy_backoff() {
    let config = HostBootConfig::from_toml(
        "[retry]\nmax_retries = 5\ninitial_backoff_ms = 1000\nmax_backoff_ms = 3000",
    )
    .unwrap();
    let policy = RetryPolicy::from(&config.retry);
    assert_eq!(policy.max_retries(), 5);
    assert_eq!(policy.backoff(1), Duration::from_millis(1000));
    assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    assert_eq!(policy.backoff(3), Duration::from_millis(3000));
    assert_eq!(policy.backoff(10), Duration::from_millis(3000));
}
