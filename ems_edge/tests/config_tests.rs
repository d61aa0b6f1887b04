//! # edge.toml loading tests

use ems_common::config::{ConfigError, LogLevel};
use ems_common::startstop::StartStopConfig;
use ems_edge::{EdgeConfig, EdgeConfigError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

// ─── Helpers ────────────────────────────────────────────────────────

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/edge.toml");
    let config = EdgeConfig::load_validated(&path).unwrap();

    assert_eq!(config.shared.service_name, "ems-edge-sim");
    assert_eq!(config.cycle.stats_log_interval, 30);
    assert_eq!(config.batteries.len(), 2);
    assert_eq!(config.batteries[0].timing.max_start_attempts, 10);
    assert_eq!(config.batteries[0].simulation.precharge_s, 5);
    assert_eq!(config.batteries[1].start_stop, StartStopConfig::Stop);
    assert_eq!(config.inverters[0].battery.as_deref(), Some("bms0"));
    assert_eq!(config.inverters[0].timing.retry_interval_s, 20);
    // Omitted keys keep their defaults.
    assert_eq!(config.inverters[0].timing.error_wait_s, 120);
    assert_eq!(config.ess[0].start_stop, StartStopConfig::Start);
    assert_eq!(config.ess[0].timing.max_start_attempts, 3);
}

#[test]
fn minimal_file() {
    let file = write_config(
        r#"
        [shared]
        service_name = "minimal"
        log_level = "debug"
        "#,
    );
    let config = EdgeConfig::load_validated(file.path()).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.device_count(), 0);
}

#[test]
fn missing_file() {
    let err = EdgeConfig::load_validated(Path::new("/nonexistent/edge.toml")).unwrap_err();
    assert_eq!(err, EdgeConfigError::Config(ConfigError::FileNotFound));
}

#[test]
fn bad_start_stop_value() {
    let file = write_config(
        r#"
        [shared]
        service_name = "s"

        [[battery]]
        id = "bms0"
        start_stop = "on"
        "#,
    );
    let err = EdgeConfig::load_validated(file.path()).unwrap_err();
    assert!(matches!(err, EdgeConfigError::Config(ConfigError::ParseError(_))));
}

#[test]
fn ess_needs_both_references() {
    let file = write_config(
        r#"
        [shared]
        service_name = "s"

        [[battery]]
        id = "bms0"

        [[ess]]
        id = "ess0"
        battery = "bms0"
        "#,
    );
    let err = EdgeConfig::load_validated(file.path()).unwrap_err();
    assert!(matches!(err, EdgeConfigError::Config(ConfigError::ParseError(_))));
}

#[test]
fn blank_service_name() {
    let file = write_config(
        r#"
        [shared]
        service_name = "  "
        "#,
    );
    let err = EdgeConfig::load_validated(file.path()).unwrap_err();
    assert!(matches!(
        err,
        EdgeConfigError::Config(ConfigError::ValidationError(_))
    ));
}
