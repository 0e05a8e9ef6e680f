use std::io::Cursor;
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;

use crate::storage::{ObjectMetadata, ObjectReader, ObjectStore};

/// A process-local object store.
///
/// Nothing is persisted, every object lives until the backend is dropped.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, (ObjectMetadata, Bytes)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of objects currently held.
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the payload stored at `key`, if any.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .ok()?
            .get(key)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn metadata(&self, key: &str) -> anyhow::Result<Option<ObjectMetadata>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(objects.get(key).map(|(metadata, _)| metadata.clone()))
    }

    async fn open_reader(&self, key: &str) -> anyhow::Result<Option<ObjectReader>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;

        Ok(objects
            .get(key)
            .map(|(_, data)| Box::pin(Cursor::new(data.clone())) as ObjectReader))
    }

    async fn store(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<()> {
        let metadata = ObjectMetadata {
            content_type: content_type.to_string(),
            size: data.len() as u64,
        };

        debug!("Storing object in memory @ {}", key);
        self.objects
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .insert(key.to_string(), (metadata, data));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_store_and_read_back() -> anyhow::Result<()> {
        let backend = MemoryBackend::new();
        backend.store("cat", Bytes::from_static(b"meow"), "image/png").await?;

        let metadata = backend.metadata("cat").await?.expect("metadata should exist");
        assert_eq!(metadata.content_type, "image/png");
        assert_eq!(metadata.size, 4);

        let mut reader = backend.open_reader("cat").await?.expect("object should exist");
        let mut buff = Vec::new();
        reader.read_to_end(&mut buff).await?;
        assert_eq!(buff, b"meow");

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_object() -> anyhow::Result<()> {
        let backend = MemoryBackend::new();
        assert!(backend.metadata("dog").await?.is_none());
        assert!(backend.open_reader("dog").await?.is_none());
        assert!(backend.is_empty());
        Ok(())
    }
}
