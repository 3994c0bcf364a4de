//! Layered configuration loading

use ptaas_core::Config;
use ptaas_core::config::{QueueBackend, Validate};

const DEFAULT_TOML: &str = include_str!("../../config/default.toml");

fn load_with(overrides: &[(&str, &str)]) -> Config {
    let mut builder = config::Config::builder()
        .add_source(config::File::from_str(DEFAULT_TOML, config::FileFormat::Toml));
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    builder.build().unwrap().try_deserialize().unwrap()
}

#[test]
fn test_shipped_defaults_are_valid() {
    let config = load_with(&[]);

    config.validate().unwrap();
    assert_eq!(config.queue.backend, QueueBackend::Redis);
    assert_eq!(config.scanners.network.default_options, "-sV -sC");
    assert_eq!(config.worker.soft_time_limit().as_secs(), 3300);
    assert!(config.defectdojo.api_key.is_none());
}

#[test]
fn test_overrides_take_precedence() {
    let config = load_with(&[
        ("queue.backend", "memory"),
        ("worker.concurrency", "8"),
        ("defectdojo.api_key", "token"),
    ]);

    assert_eq!(config.queue.backend, QueueBackend::Memory);
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.defectdojo.api_key.as_deref(), Some("token"));
}

#[test]
fn test_soft_limit_must_precede_hard_limit() {
    let config = load_with(&[
        ("worker.soft_time_limit_seconds", "3600"),
        ("worker.hard_time_limit_seconds", "3300"),
    ]);

    assert!(config.validate().is_err());
}

#[test]
fn test_missing_sections_fall_back_to_defaults() {
    let config: Config = config::Config::builder()
        .add_source(config::File::from_str("[server]\nport = 9000\n", config::FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.queue.queue_key, "ptaas:scan_queue");
}
