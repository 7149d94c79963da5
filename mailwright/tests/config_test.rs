use std::io::Write;

use mailwright::config::{Constants, EnvConfig, Settings};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct TestConfig {
    host: String,
    port: u16,
    debug: bool,
}

#[test]
fn env_config_with_prefix() {
    std::env::set_var("CFGTEST_HOST", "0.0.0.0");
    std::env::set_var("CFGTEST_PORT", "3000");
    std::env::set_var("CFGTEST_DEBUG", "false");

    let config = TestConfig::from_env_with_prefix("CFGTEST").unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 3000);
    assert!(!config.debug);

    std::env::remove_var("CFGTEST_HOST");
    std::env::remove_var("CFGTEST_PORT");
    std::env::remove_var("CFGTEST_DEBUG");
}

#[test]
fn settings_fall_back_to_defaults() {
    let settings = Settings::from_env_with_prefix("SETTINGSTEST_UNSET").unwrap();

    assert_eq!(settings.database_url, "sqlite://mailwright.db");
    assert_eq!(settings.page_size, 10);
    assert!(settings.retention().is_none());
    assert!(settings.encryption_key().unwrap().is_none());
    assert_eq!(settings.smtp_timeout_secs, 10);
}

#[test]
fn huge_retention_saturates() {
    let settings = Settings {
        log_retention_days: u64::MAX,
        ..Settings::default()
    };

    assert_eq!(
        settings.retention(),
        Some(std::time::Duration::from_secs(u64::MAX))
    );
}

#[test]
fn settings_read_prefixed_environment() {
    std::env::set_var("SETTINGSTEST_DATABASE_URL", "sqlite::memory:");
    std::env::set_var("SETTINGSTEST_LOG_RETENTION_DAYS", "30");
    std::env::set_var("SETTINGSTEST_MULTISITE", "true");
    std::env::set_var("SETTINGSTEST_PRUNE_SCHEDULE", "0 0 3 * * *");

    let settings = Settings::from_env_with_prefix("SETTINGSTEST").unwrap();

    assert_eq!(settings.database_url, "sqlite::memory:");
    assert!(settings.multisite);
    assert_eq!(
        settings.retention(),
        Some(std::time::Duration::from_secs(30 * 86_400))
    );
    let schedule = settings.prune_schedule.expect("schedule parsed");
    assert!(schedule.upcoming(chrono::Utc).next().is_some());

    std::env::remove_var("SETTINGSTEST_DATABASE_URL");
    std::env::remove_var("SETTINGSTEST_LOG_RETENTION_DAYS");
    std::env::remove_var("SETTINGSTEST_MULTISITE");
    std::env::remove_var("SETTINGSTEST_PRUNE_SCHEDULE");
}

#[test]
fn invalid_encryption_key_is_reported() {
    let settings = Settings {
        encryption_key: Some("not base64 at all!".to_string()),
        ..Settings::default()
    };

    assert!(settings.encryption_key().is_err());
}

#[test]
fn constants_load_from_toml() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "SMTP_HOST = \"smtp.example.com\"").unwrap();
    writeln!(file, "SMTP_PORT = 2525").unwrap();
    writeln!(file, "SMTP_AUTH = true").unwrap();

    let constants = Constants::load(file.path()).unwrap();

    assert_eq!(constants.get("SMTP_HOST"), Some("smtp.example.com"));
    assert_eq!(constants.get("smtp_port"), Some("2525"));
    assert_eq!(constants.get("SMTP_AUTH"), Some("true"));
    assert!(!constants.is_defined("SMTP_USER"));
}

#[test]
fn missing_constants_file_is_empty() {
    let constants = Constants::load("/nonexistent/mailwright-constants.toml").unwrap();
    assert!(!constants.is_defined("SMTP_HOST"));
}
