use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

/// An owned byte stream over a stored object.
///
/// The underlying handle (file, HTTP body, ...) is released when the reader
/// is dropped.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// The metadata recorded alongside every stored object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,

    #[serde(default)]
    pub size: u64,
}

#[async_trait]
pub trait ObjectStore: Sync + Send + 'static {
    /// Fetches the metadata of the object at `key`.
    ///
    /// Returns `Ok(None)` when no such object exists.
    async fn metadata(&self, key: &str) -> anyhow::Result<Option<ObjectMetadata>>;

    /// Opens a read stream over the object at `key`.
    ///
    /// Returns `Ok(None)` when no such object exists.
    async fn open_reader(&self, key: &str) -> anyhow::Result<Option<ObjectReader>>;

    /// Creates or replaces the object at `key`.
    ///
    /// Implementations must not leave a partially written object visible if
    /// this returns an error.
    async fn store(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<()>;
}
