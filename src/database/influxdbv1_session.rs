// InfluxDB v1 session - speaks the v1 HTTP API directly
//
// There is no maintained v1 client crate worth depending on; the write
// endpoint is a single line-protocol POST, so the session builds the
// request itself.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::database::config::InfluxDbV1Config;
use crate::database::line_protocol::{self, Point, WriteOptions, WritePrecision};
use crate::database::{DatabaseError, error_for_status};

/// Scoped connection to an InfluxDB v1 server, configured from
/// `influxdbv1_config.yaml` in the database config directory.
///
/// ```no_run
/// use service_base::database::{InfluxDbV1Session, Point, WriteOptions};
///
/// # async fn demo() -> Result<(), service_base::database::DatabaseError> {
/// let session = InfluxDbV1Session::connect()?;
/// let points = vec![
///     Point::new("cpu_load_short")
///         .tag("host", "server01")
///         .tag("region", "us-west")
///         .field("value", 0.64),
/// ];
/// session.write_points(&points, &WriteOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct InfluxDbV1Session {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
}

impl InfluxDbV1Session {
    pub fn connect() -> Result<Self, DatabaseError> {
        Self::connect_with(InfluxDbV1Config::load()?)
    }

    pub fn connect_with(config: InfluxDbV1Config) -> Result<Self, DatabaseError> {
        let scheme = if config.ssl { "https" } else { "http" };
        let base_url = format!("{scheme}://{}:{}", config.host, config.port);

        let mut builder = reqwest::Client::builder();
        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(headers) = &config.headers {
            let mut map = HeaderMap::new();
            for (key, value) in headers {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| DatabaseError::InvalidHeader(key.clone()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| DatabaseError::InvalidHeader(key.clone()))?;
                map.insert(name, value);
            }
            builder = builder.default_headers(map);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            username: config.username,
            password: config.password,
            database: config.database,
        })
    }

    fn write_url(&self, database: &str, precision: WritePrecision) -> String {
        format!(
            "{}/write?db={}&precision={}",
            self.base_url,
            urlencoding::encode(database),
            precision.v1_param()
        )
    }

    /// Write points to the session database (or the override in
    /// `options`). The server answers a successful write with 204; any
    /// other status is returned as [`DatabaseError::Http`] with the body
    /// text the server sent.
    pub async fn write_points(
        &self,
        points: &[Point],
        options: &WriteOptions,
    ) -> Result<(), DatabaseError> {
        let body = line_protocol::encode_points(points, &options.tags)?;
        let database = options.database.as_deref().unwrap_or(&self.database);
        debug!("writing {} points to influxdb v1 database {database}", points.len());

        let response = self
            .client
            .post(self.write_url(database, options.precision))
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        error_for_status(response).await
    }

    /// Connectivity check against the `/ping` endpoint.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        error_for_status(response).await
    }
}

impl fmt::Debug for InfluxDbV1Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbV1Session")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> InfluxDbV1Session {
        InfluxDbV1Session::connect_with(InfluxDbV1Config {
            host: "localhost".to_string(),
            port: 8086,
            username: "admin".to_string(),
            password: "pw".to_string(),
            database: "metrics".to_string(),
            ssl: false,
            verify_ssl: true,
            headers: None,
        })
        .unwrap()
    }

    #[test]
    fn write_url_encodes_database_and_precision() {
        let url = session().write_url("my db", WritePrecision::Seconds);
        assert_eq!(url, "http://localhost:8086/write?db=my%20db&precision=s");
    }

    #[test]
    fn ssl_switches_the_scheme() {
        let session = InfluxDbV1Session::connect_with(InfluxDbV1Config {
            host: "influx.example.com".to_string(),
            port: 8086,
            username: "admin".to_string(),
            password: "pw".to_string(),
            database: "metrics".to_string(),
            ssl: true,
            verify_ssl: false,
            headers: None,
        })
        .unwrap();
        assert!(session.base_url.starts_with("https://"));
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let mut headers = std::collections::HashMap::new();
        headers.insert("bad header\n".to_string(), "x".to_string());
        let result = InfluxDbV1Session::connect_with(InfluxDbV1Config {
            host: "localhost".to_string(),
            port: 8086,
            username: "admin".to_string(),
            password: "pw".to_string(),
            database: "metrics".to_string(),
            ssl: false,
            verify_ssl: true,
            headers: Some(headers),
        });
        assert!(matches!(result, Err(DatabaseError::InvalidHeader(_))));
    }

    #[test]
    fn debug_output_omits_password() {
        assert!(!format!("{:?}", session()).contains("pw"));
    }
}
