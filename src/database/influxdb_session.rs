// InfluxDB v2 session over the influxdb2 client
use std::fmt;
use std::ops::Deref;

use futures::stream;
use influxdb2::Client;
use influxdb2::api::write::TimestampPrecision;
use influxdb2::models::{DataPoint, PostBucketRequest};
use tracing::{debug, error};

use crate::database::DatabaseError;
use crate::database::config::InfluxDbConfig;

const BUCKET_ALREADY_EXISTS: u16 = 422;

/// Scoped connection to an InfluxDB v2 server, configured from
/// `influxdb_config.yaml` in the database config directory.
///
/// The session dereferences to [`influxdb2::Client`], so the full client
/// API stays reachable.
///
/// ```no_run
/// use influxdb2::models::DataPoint;
/// use service_base::database::InfluxDbSession;
///
/// # async fn demo() -> Result<(), service_base::database::DatabaseError> {
/// let session = InfluxDbSession::connect()?;
/// let point = DataPoint::builder("chamber_pressure")
///     .tag("chamber", "main")
///     .field("mbar", 2.3e-9)
///     .build()
///     .unwrap();
/// session.write("experiment", vec![point]).await?;
/// # Ok(())
/// # }
/// ```
pub struct InfluxDbSession {
    client: Client,
    url: String,
    org: String,
}

impl InfluxDbSession {
    pub fn connect() -> Result<Self, DatabaseError> {
        Ok(Self::connect_with(InfluxDbConfig::load()?))
    }

    pub fn connect_with(config: InfluxDbConfig) -> Self {
        let client = Client::new(&config.url, &config.org, &config.token);
        Self {
            client,
            url: config.url,
            org: config.org,
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Write points to a bucket in the session org.
    pub async fn write(&self, bucket: &str, points: Vec<DataPoint>) -> Result<(), DatabaseError> {
        self.client.write(bucket, stream::iter(points)).await?;
        Ok(())
    }

    /// Write points with an explicit timestamp precision.
    pub async fn write_with_precision(
        &self,
        bucket: &str,
        points: Vec<DataPoint>,
        precision: TimestampPrecision,
    ) -> Result<(), DatabaseError> {
        self.client
            .write_with_precision(bucket, stream::iter(points), precision)
            .await?;
        Ok(())
    }

    /// Create a bucket. A bucket that already exists is not an error; the
    /// server's 422 response is logged at debug level and swallowed.
    pub async fn create_bucket(
        &self,
        name: &str,
        org_id: &str,
        description: Option<String>,
    ) -> Result<(), DatabaseError> {
        let mut request = PostBucketRequest::new(org_id.to_string(), name.to_string());
        request.description = description;

        match self.client.create_bucket(Some(request)).await {
            Ok(()) => Ok(()),
            Err(influxdb2::RequestError::Http { status, text })
                if status.as_u16() == BUCKET_ALREADY_EXISTS =>
            {
                debug!("bucket '{name}' already exists: {text}");
                Ok(())
            }
            Err(e) => {
                error!("creating bucket '{name}' failed: {e}");
                Err(e.into())
            }
        }
    }
}

impl Deref for InfluxDbSession {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for InfluxDbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxDbSession")
            .field("url", &self.url)
            .field("org", &self.org)
            .finish()
    }
}
