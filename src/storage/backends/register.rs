use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::ObjectStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfigs {
    /// Keeps everything in process memory, mostly useful for testing.
    Memory {},

    FileSystem {
        /// The root directory, each bucket becomes a sub-directory.
        directory: PathBuf,
    },

    BlobStorage {
        region: String,
        endpoint: String,
        access_key: Option<String>,
        secret_key: Option<String>,
        session_token: Option<String>,

        /// The per-request timeout in seconds.
        request_timeout: Option<u64>,
    },
}

impl BackendConfigs {
    pub async fn connect(&self, bucket: &str) -> anyhow::Result<Arc<dyn ObjectStore>> {
        match self {
            Self::Memory {} => Ok(Arc::new(super::memory::MemoryBackend::new())),
            Self::FileSystem { directory } => {
                tokio::fs::create_dir_all(directory.join(bucket)).await?;
                Ok(Arc::new(super::filesystem::FileSystemBackend::new(
                    directory.clone(),
                    bucket,
                )))
            },
            Self::BlobStorage {
                region,
                endpoint,
                access_key,
                secret_key,
                session_token,
                request_timeout,
            } => {
                let backend = super::blob_storage::BlobStorageBackend::new(
                    bucket.to_string(),
                    region.clone(),
                    endpoint.clone(),
                    access_key.as_deref(),
                    secret_key.as_deref(),
                    session_token.as_deref(),
                    request_timeout.map(Duration::from_secs),
                )?;
                Ok(Arc::new(backend))
            },
        }
    }
}
