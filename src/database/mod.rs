// Database layer - config-driven sessions over third-party clients
pub mod config;
pub mod influxdb_session;
pub mod influxdbv1_session;
pub mod influxdbv3_session;
pub mod json_codec;
pub mod line_protocol;
pub mod postgres_session;

pub use self::config::{
    Environment, InfluxDbConfig, InfluxDbV1Config, InfluxDbV3Config, OperationMode,
    PostgreSqlConfig, ServiceConfig,
};
pub use influxdb_session::InfluxDbSession;
pub use influxdbv1_session::InfluxDbV1Session;
pub use influxdbv3_session::InfluxDbV3Session;
pub use line_protocol::{FieldValue, Point, WriteOptions, WritePrecision};
pub use postgres_session::PostgresSession;

use ::config::ConfigError;
use thiserror::Error;

/// Errors surfaced by the database sessions.
///
/// Failures of the underlying client libraries are carried through
/// unchanged; this enum only gives them a common shape.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Configuration file missing, unreadable, or missing fields.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error reported by the InfluxDB v2 client.
    #[error("influxdb request failed: {0}")]
    Influx(#[from] influxdb2::RequestError),

    /// Transport-level HTTP failure.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response from an InfluxDB HTTP API.
    #[error("server returned {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Error reported by the PostgreSQL driver.
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A point failed line-protocol validation.
    #[error("invalid point: {0}")]
    InvalidPoint(String),

    /// A configured extra header could not be used.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

/// Turn a non-success HTTP response into [`DatabaseError::Http`], keeping
/// the body text the server sent.
pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<(), DatabaseError> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(DatabaseError::Http { status, body })
}
