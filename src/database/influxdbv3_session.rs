// InfluxDB v3 session - line protocol over the v3 HTTP API
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::database::config::InfluxDbV3Config;
use crate::database::line_protocol::{self, Point, WriteOptions, WritePrecision};
use crate::database::{DatabaseError, error_for_status};

/// Scoped connection to an InfluxDB v3 server.
///
/// Built either from explicit parameters or from `influxdbv3_config.yaml`
/// in the database config directory:
///
/// ```no_run
/// use service_base::database::{InfluxDbV3Session, Point, WriteOptions};
///
/// # async fn demo() -> Result<(), service_base::database::DatabaseError> {
/// let session = InfluxDbV3Session::from_config_file(None)?;
/// let points = vec![Point::new("ion_count").field("value", 17i64)];
/// session.write(&points, &WriteOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct InfluxDbV3Session {
    client: reqwest::Client,
    host: String,
    org: String,
    bucket: String,
    token: String,
}

impl InfluxDbV3Session {
    /// Disabling `verify_ssl` skips certificate validation; leave it on
    /// outside of test setups.
    pub fn new(
        host: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
        token: impl Into<String>,
        verify_ssl: bool,
    ) -> Result<Self, DatabaseError> {
        let mut builder = reqwest::Client::builder();
        if !verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let host = host.into();
        Ok(Self {
            client: builder.build()?,
            host: host.trim_end_matches('/').to_string(),
            org: org.into(),
            bucket: bucket.into(),
            token: token.into(),
        })
    }

    /// Build a session from a config file; `None` falls back to
    /// `influxdbv3_config.yaml` in the discovered config directory.
    pub fn from_config_file(path: Option<&Path>) -> Result<Self, DatabaseError> {
        let config = match path {
            Some(path) => InfluxDbV3Config::load_from(path)?,
            None => InfluxDbV3Config::load()?,
        };
        Self::new(
            config.url,
            config.org,
            config.bucket,
            config.token,
            config.verify_ssl,
        )
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn write_url(&self, database: &str, precision: WritePrecision) -> String {
        format!(
            "{}/api/v3/write_lp?db={}&precision={}",
            self.host,
            urlencoding::encode(database),
            precision.v3_param()
        )
    }

    /// Write points to the session bucket (or the override in `options`).
    pub async fn write(
        &self,
        points: &[Point],
        options: &WriteOptions,
    ) -> Result<(), DatabaseError> {
        let body = line_protocol::encode_points(points, &options.tags)?;
        let database = options.database.as_deref().unwrap_or(&self.bucket);
        debug!("writing {} points to influxdb v3 database {database}", points.len());

        let response = self
            .client
            .post(self.write_url(database, options.precision))
            .bearer_auth(&self.token)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        error_for_status(response).await
    }

    /// Probe the server's `/health` endpoint.
    pub async fn health(&self) -> Result<(), DatabaseError> {
        let response = self
            .client
            .get(format!("{}/health", self.host))
            .bearer_auth(&self.token)
            .send()
            .await?;
        error_for_status(response).await
    }
}

impl fmt::Debug for InfluxDbV3Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbV3Session")
            .field("host", &self.host)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> InfluxDbV3Session {
        InfluxDbV3Session::new(
            "http://localhost:8181/",
            "test-org",
            "test-bucket",
            "test-token",
            true,
        )
        .unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped_from_host() {
        assert_eq!(session().host, "http://localhost:8181");
    }

    #[test]
    fn write_url_uses_v3_precision_spelling() {
        let url = session().write_url("test-bucket", WritePrecision::Milliseconds);
        assert_eq!(
            url,
            "http://localhost:8181/api/v3/write_lp?db=test-bucket&precision=millisecond"
        );
    }

    #[test]
    fn debug_output_omits_token() {
        assert!(!format!("{:?}", session()).contains("test-token"));
    }
}
