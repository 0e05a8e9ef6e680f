use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rusoto_core::credential::{ChainProvider, StaticProvider};
use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_s3::{
    GetObjectError,
    GetObjectRequest,
    HeadObjectError,
    HeadObjectRequest,
    PutObjectRequest,
    S3Client,
    S3,
};
use tracing::instrument;

use crate::storage::{ObjectMetadata, ObjectReader, ObjectStore};
use crate::utils::OCTET_STREAM;

/// An S3 compatible remote object store.
pub struct BlobStorageBackend {
    name: String,
    client: S3Client,
    request_timeout: Option<Duration>,
}

impl BlobStorageBackend {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        region: String,
        endpoint: String,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        session_token: Option<&str>,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let region = Region::Custom { name: region, endpoint };
        let http = HttpClient::new().context("failed to create TLS client")?;

        let client = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let creds = StaticProvider::new(
                    access_key.to_string(),
                    secret_key.to_string(),
                    session_token.map(String::from),
                    None,
                );
                S3Client::new_with(http, creds, region)
            },
            (None, None) => S3Client::new_with(http, ChainProvider::new(), region),
            _ => return Err(anyhow!("access_key and secret_key must be given together")),
        };

        Ok(Self {
            name,
            client,
            request_timeout,
        })
    }

    /// Bounds a single request by the configured timeout.
    async fn timed<T, E>(
        &self,
        request: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<std::result::Result<T, E>> {
        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| anyhow!("remote storage bucket timed out after {:?}", timeout)),
            None => Ok(request.await),
        }
    }
}

/// HEAD responses carry no body so a missing key usually arrives as an
/// unparsed 404 rather than a typed service error.
fn is_not_found<E>(err: &RusotoError<E>) -> bool {
    matches!(err, RusotoError::Unknown(resp) if resp.status.as_u16() == 404)
}

#[async_trait]
impl ObjectStore for BlobStorageBackend {
    #[instrument(skip(self), level = "debug")]
    async fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>> {
        let request = HeadObjectRequest {
            bucket: self.name.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        debug!("Retrieving metadata in bucket @ {}", key);
        match self.timed(self.client.head_object(request)).await? {
            Ok(output) => Ok(Some(ObjectMetadata {
                content_type: output
                    .content_type
                    .unwrap_or_else(|| OCTET_STREAM.to_string()),
                size: output.content_length.unwrap_or_default().max(0) as u64,
            })),
            Err(RusotoError::Service(HeadObjectError::NoSuchKey(_))) => Ok(None),
            Err(ref e) if is_not_found(e) => Ok(None),
            Err(other) => Err(anyhow!(other).context("remote storage bucket rejected HEAD")),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_reader(&self, key: &str) -> Result<Option<ObjectReader>> {
        let request = GetObjectRequest {
            bucket: self.name.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        debug!("Retrieving image in bucket @ {}", key);
        match self.timed(self.client.get_object(request)).await? {
            Ok(output) => {
                let body = output
                    .body
                    .ok_or_else(|| anyhow!("remote storage bucket returned no body for {}", key))?;
                Ok(Some(Box::pin(body.into_async_read())))
            },
            Err(RusotoError::Service(GetObjectError::NoSuchKey(_))) => Ok(None),
            Err(ref e) if is_not_found(e) => Ok(None),
            Err(other) => Err(anyhow!(other).context("remote storage bucket rejected GET")),
        }
    }

    #[instrument(skip(self, data), level = "debug")]
    async fn store(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let request = PutObjectRequest {
            bucket: self.name.clone(),
            key: key.to_string(),
            content_length: Some(data.len() as i64),
            content_type: Some(content_type.to_string()),
            body: Some(data.to_vec().into()),
            ..Default::default()
        };

        debug!("Storing image in bucket @ {}", key);
        self.timed(self.client.put_object(request))
            .await?
            .map(|_| ())
            .map_err(|e| anyhow!(e).context("remote storage bucket rejected PUT"))
    }
}
