use std::io::Write;

use clap::Parser;
use tempfile::{NamedTempFile, TempDir};

use unified_push::cli::Cli;
use unified_push::config::{self, PushConfig, APNS_SANDBOX_HOST};

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_merges_file_and_cli() {
    let file = write_config(
        r#"
        [apns]
        port = 12195
        error_wait_ms = 250
        max_retries = 5

        [gcm]
        api_key = "from-file"

        [logging]
        level = "warn"
        format = "json"
        "#,
    );
    let path = file.path().to_str().unwrap();

    let cli = Cli::try_parse_from([
        "unified-push",
        "--config-file",
        path,
        "--sandbox",
        "--log-level",
        "debug",
        "show-config",
    ])
    .unwrap();
    let config = PushConfig::load(&cli).unwrap();

    assert_eq!(
        config.apns.gateway_address(),
        format!("{}:12195", APNS_SANDBOX_HOST)
    );
    assert_eq!(config.apns.max_retries, Some(5));
    assert_eq!(
        config.apns.session_config().error_wait,
        std::time::Duration::from_millis(250)
    );
    assert_eq!(config.gcm.api_key.as_deref(), Some("from-file"));
    // 命令行优先于配置文件
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format.as_deref(), Some("json"));
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let cli = Cli::try_parse_from([
        "unified-push",
        "--config-file",
        path.to_str().unwrap(),
        "show-config",
    ])
    .unwrap();
    let config = PushConfig::load(&cli).unwrap();
    assert_eq!(config.apns.port, 2195);
}

#[test]
fn test_malformed_config_file_is_error() {
    let file = write_config("[apns\nport = 1");
    let cli = Cli::try_parse_from([
        "unified-push",
        "--config-file",
        file.path().to_str().unwrap(),
        "show-config",
    ])
    .unwrap();
    assert!(PushConfig::load(&cli).is_err());
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let file = write_config("[apns]\nport = 0\n");
    let cli = Cli::try_parse_from([
        "unified-push",
        "--config-file",
        file.path().to_str().unwrap(),
        "show-config",
    ])
    .unwrap();
    assert!(PushConfig::load(&cli).is_err());
}

#[test]
fn test_generated_config_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unified-push.toml");
    std::fs::write(&path, config::default_config_toml()).unwrap();

    let config = PushConfig::from_toml_file(&path).unwrap();
    assert_eq!(config.apns.port, 2195);
    assert_eq!(config.apns.max_retries, Some(3));
    assert_eq!(config.mpns.request_timeout_ms, 30_000);
}
