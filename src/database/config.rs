// Configuration records for the database sessions
//
// Each session reads its YAML file from the database config directory,
// which itself is discovered through environment variables. The records
// carry no behavior beyond field presence; they are read once at session
// construction and dropped afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, Environment as EnvSource, File};
use serde::Deserialize;

use crate::database::DatabaseError;

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DatabaseError> {
    let settings = Config::builder().add_source(File::from(path)).build()?;
    Ok(settings.try_deserialize()?)
}

/// Deployment environment, selected through the `ENVIRONMENT` variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Process-level operation mode. Selects which `postgres_<environment>.yaml`
/// file the Postgres session reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationMode {
    #[serde(default)]
    pub environment: Environment,
}

impl OperationMode {
    pub fn load() -> Result<Self, DatabaseError> {
        let settings = Config::builder().add_source(EnvSource::default()).build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("database_config")
}

/// Where the database config files live. Overridable through
/// `SERVICE_DATABASE_CONFIG_DIR`, defaults to `database_config` relative to
/// the working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_config_dir")]
    pub database_config_dir: PathBuf,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, DatabaseError> {
        let settings = Config::builder()
            .add_source(EnvSource::with_prefix("SERVICE"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Resolve a config file name inside the discovered directory.
    pub fn config_file(name: &str) -> Result<PathBuf, DatabaseError> {
        Ok(Self::load()?.database_config_dir.join(name))
    }
}

/// Connection record for InfluxDB v2 (`influxdb_config.yaml`).
#[derive(Clone, Deserialize)]
pub struct InfluxDbConfig {
    pub url: String,
    pub org: String,
    pub token: String,
}

impl InfluxDbConfig {
    pub const FILE_NAME: &'static str = "influxdb_config.yaml";

    pub fn load() -> Result<Self, DatabaseError> {
        Self::load_from(ServiceConfig::config_file(Self::FILE_NAME)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        load_yaml(path.as_ref())
    }
}

impl fmt::Debug for InfluxDbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn default_true() -> bool {
    true
}

/// Connection record for InfluxDB v1 (`influxdbv1_config.yaml`).
#[derive(Clone, Deserialize)]
pub struct InfluxDbV1Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Extra headers attached to every request.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl InfluxDbV1Config {
    pub const FILE_NAME: &'static str = "influxdbv1_config.yaml";

    pub fn load() -> Result<Self, DatabaseError> {
        Self::load_from(ServiceConfig::config_file(Self::FILE_NAME)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        load_yaml(path.as_ref())
    }
}

impl fmt::Debug for InfluxDbV1Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbV1Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// Connection record for InfluxDB v3 (`influxdbv3_config.yaml`).
#[derive(Clone, Deserialize)]
pub struct InfluxDbV3Config {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl InfluxDbV3Config {
    pub const FILE_NAME: &'static str = "influxdbv3_config.yaml";

    pub fn load() -> Result<Self, DatabaseError> {
        Self::load_from(ServiceConfig::config_file(Self::FILE_NAME)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        load_yaml(path.as_ref())
    }
}

impl fmt::Debug for InfluxDbV3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbV3Config")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// Connection record for PostgreSQL (`postgres_<environment>.yaml`).
#[derive(Clone, Deserialize)]
pub struct PostgreSqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PostgreSqlConfig {
    /// Reads the config file matching the current [`OperationMode`], e.g.
    /// `postgres_development.yaml`.
    pub fn load() -> Result<Self, DatabaseError> {
        let mode = OperationMode::load()?;
        let file_name = format!("postgres_{}.yaml", mode.environment.as_str());
        Self::load_from(ServiceConfig::config_file(&file_name)?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        load_yaml(path.as_ref())
    }
}

impl fmt::Debug for PostgreSqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgreSqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
