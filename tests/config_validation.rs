//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use docwire::config::{DocwireConfig, LoggingConfig, ServerConfig, TransportConfig};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = DocwireConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = DocwireConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = DocwireConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = DocwireConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_high_max_connections_warning() {
    let mut config = DocwireConfig::default();
    config.server.max_connections = 150_000;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections very high")));
}

#[test]
fn test_idle_timeout_zero_disables() {
    let mut config = DocwireConfig::default();
    config.server.idle_timeout = Duration::ZERO;
    assert!(config.validate().is_empty());

    config.server.idle_timeout = Duration::from_millis(20);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Idle timeout too short")));
}

#[test]
fn test_short_write_timeout() {
    let mut config = DocwireConfig::default();
    config.server.write_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Write timeout too short")));
}

#[test]
fn test_long_shutdown_timeout() {
    let mut config = DocwireConfig::default();
    config.server.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_tiny_max_message_size() {
    let mut config = DocwireConfig::default();
    config.transport.max_message_size = 512;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max message size too small")));
}

#[test]
fn test_document_larger_than_message() {
    let mut config = DocwireConfig::default();
    config.transport.max_message_size = 4096;
    config.transport.max_document_size = 8192;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("cannot be larger than max message size")));
}

#[test]
fn test_zero_write_batch_size() {
    let mut config = DocwireConfig::default();
    config.transport.max_write_batch_size = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max write batch size cannot be 0")));
}

#[test]
fn test_empty_app_name() {
    let mut config = DocwireConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = DocwireConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = DocwireConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = DocwireConfig::default();
    config.server.address = String::new();

    let result = config.validate_strict();
    assert!(result.is_err());

    if let Err(e) = result {
        let error_str = e.to_string();
        assert!(error_str.contains("Configuration validation failed"));
    }
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = DocwireConfig::default();

    config.server.address = String::new();
    config.server.max_connections = 0;
    config.transport.max_message_size = 0;
    config.transport.max_write_batch_size = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 5,
        "Expected at least 5 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_valid_production_config() {
    let config = DocwireConfig {
        server: ServerConfig {
            address: "0.0.0.0:27017".to_string(),
            max_connections: 10_000,
            idle_timeout: Duration::from_secs(600),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        },
        transport: TransportConfig {
            max_message_size: 48_000_000,
            max_document_size: 16 * 1024 * 1024,
            max_write_batch_size: 100_000,
        },
        logging: LoggingConfig {
            app_name: "docwire-production".to_string(),
            log_level: Level::INFO,
            json_format: true,
        },
    };

    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Production config should be valid, got: {:?}",
        errors
    );
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = DocwireConfig::from_toml(
        r#"
        [server]
        address = "0.0.0.0:27017"
        idle_timeout = 5000

        [logging]
        log_level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.server.address, "0.0.0.0:27017");
    assert_eq!(config.server.idle_timeout, Duration::from_secs(5));
    assert_eq!(config.server.max_connections, 1000);
    assert_eq!(config.transport.max_message_size, 48_000_000);
    assert_eq!(config.logging.log_level, Level::DEBUG);
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = DocwireConfig::from_toml(
        r#"
        [logging]
        log_level = "loud"
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docwire.toml");

    let config = DocwireConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:9999".to_string();
        c.logging.json_format = true;
    });
    config.save_to_file(&path).unwrap();

    let loaded = DocwireConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.address, "127.0.0.1:9999");
    assert!(loaded.logging.json_format);
    assert_eq!(loaded.server.write_timeout, config.server.write_timeout);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = DocwireConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_example_config_parses() {
    let example = DocwireConfig::example_config();
    let parsed = DocwireConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}
