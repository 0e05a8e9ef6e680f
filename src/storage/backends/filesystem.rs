use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{ObjectMetadata, ObjectReader, ObjectStore};

const OBJECTS_DIR: &str = "objects";

/// Upper bound on the metadata line at the start of an object file.
const MAX_HEADER_LEN: u64 = 4096;

/// Stores each object as a single file under `<directory>/<bucket>/objects`.
///
/// The file starts with the object's metadata as one line of JSON followed by
/// the payload, so the rename that moves a finished write into place commits
/// both at once.
pub struct FileSystemBackend {
    directory: PathBuf,
}

impl FileSystemBackend {
    pub fn new(dir: PathBuf, bucket: &str) -> Self {
        Self {
            directory: dir.join(bucket),
        }
    }

    #[inline]
    fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        Ok(self.directory.join(OBJECTS_DIR).join(validate_key(key)?))
    }

    /// Opens the object file and reads past its metadata line.
    async fn open(&self, key: &str) -> anyhow::Result<Option<(ObjectMetadata, BufReader<File>)>> {
        let path = self.object_path(key)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(other) => return Err(other.into()),
        };

        let mut reader = BufReader::new(file);
        let metadata = read_header(&mut reader)
            .await
            .with_context(|| format!("corrupt object file for {:?}", key))?;

        Ok(Some((metadata, reader)))
    }
}

/// Keys map directly onto file names so anything that could escape the
/// bucket directory is refused.
fn validate_key(key: &str) -> anyhow::Result<&Path> {
    let path = Path::new(key);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(anyhow!("object key {:?} is not a valid file name", key)),
    }
}

fn encode_header(metadata: &ObjectMetadata) -> anyhow::Result<Vec<u8>> {
    let mut header = serde_json::to_vec(metadata)?;
    header.push(b'\n');
    Ok(header)
}

async fn read_header<R>(reader: &mut R) -> anyhow::Result<ObjectMetadata>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    reader.take(MAX_HEADER_LEN).read_until(b'\n', &mut line).await?;
    if line.pop() != Some(b'\n') {
        return Err(anyhow!("metadata line is missing or too long"));
    }

    Ok(serde_json::from_slice(&line)?)
}

/// Writes `header` followed by `body` next to `path` and renames the result
/// into place. On failure the previous file at `path`, if any, is untouched.
async fn write_atomic<R>(path: &Path, header: &[u8], body: &mut R) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path {:?} has no parent directory", path))?;

    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let file = match File::create(&tmp).await {
        Ok(file) => file,
        Err(ref e) if e.kind() == ErrorKind::NotFound => {
            tokio::fs::create_dir_all(parent).await?;
            File::create(&tmp).await?
        },
        Err(other) => return Err(other.into()),
    };

    let mut written = fill(file, header, body).await;
    if written.is_ok() {
        written = tokio::fs::rename(&tmp, path).await;
    }

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(anyhow::Error::from(e).context(format!("failed to write {:?}", path)));
    }

    Ok(())
}

async fn fill<R>(mut file: File, header: &[u8], body: &mut R) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    file.write_all(header).await?;
    tokio::io::copy(body, &mut file).await?;
    file.flush().await
}

#[async_trait]
impl ObjectStore for FileSystemBackend {
    #[instrument(skip(self), level = "debug")]
    async fn metadata(&self, key: &str) -> anyhow::Result<Option<ObjectMetadata>> {
        debug!("Retrieving metadata for {}", key);
        Ok(self.open(key).await?.map(|(metadata, _)| metadata))
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_reader(&self, key: &str) -> anyhow::Result<Option<ObjectReader>> {
        debug!("Retrieving image for {}", key);
        Ok(self
            .open(key)
            .await?
            .map(|(_, reader)| Box::pin(reader) as ObjectReader))
    }

    #[instrument(skip(self, data), level = "debug")]
    async fn store(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<()> {
        let header = encode_header(&ObjectMetadata {
            content_type: content_type.to_string(),
            size: data.len() as u64,
        })?;
        let object_path = self.object_path(key)?;

        debug!("Storing image @ {:?}", &object_path);
        write_atomic(&object_path, &header, &mut data.as_ref()).await
    }
}
