// Config-dir discovery through environment variables
//
// These mutate process environment, so they run serialized.

use std::fs;

use serial_test::serial;
use service_base::database::{Environment, InfluxDbV3Config, OperationMode, ServiceConfig};

#[test]
#[serial]
fn database_config_dir_from_environment() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_dir = dir.path().join("database_config");
    fs::create_dir(&config_dir)?;
    fs::write(
        config_dir.join("influxdbv3_config.yaml"),
        "url: http://localhost:8181\norg: test-org\nbucket: test-bucket\ntoken: test-token\nverify_ssl: false\n",
    )?;

    unsafe {
        std::env::set_var("SERVICE_DATABASE_CONFIG_DIR", &config_dir);
    }
    let result = (|| -> anyhow::Result<()> {
        let service_config = ServiceConfig::load()?;
        assert_eq!(service_config.database_config_dir, config_dir);

        let config = InfluxDbV3Config::load()?;
        assert_eq!(config.url, "http://localhost:8181");
        assert_eq!(config.org, "test-org");
        assert_eq!(config.bucket, "test-bucket");
        assert!(!config.verify_ssl);
        Ok(())
    })();
    unsafe {
        std::env::remove_var("SERVICE_DATABASE_CONFIG_DIR");
    }
    result
}

#[test]
#[serial]
fn missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    unsafe {
        std::env::set_var("SERVICE_DATABASE_CONFIG_DIR", dir.path());
    }
    let result = InfluxDbV3Config::load();
    unsafe {
        std::env::remove_var("SERVICE_DATABASE_CONFIG_DIR");
    }
    assert!(result.is_err());
}

#[test]
#[serial]
fn operation_mode_from_environment() {
    unsafe {
        std::env::set_var("ENVIRONMENT", "production");
    }
    let mode = OperationMode::load().unwrap();
    unsafe {
        std::env::remove_var("ENVIRONMENT");
    }
    assert_eq!(mode.environment, Environment::Production);

    let mode = OperationMode::load().unwrap();
    assert_eq!(mode.environment, Environment::Development);
}
