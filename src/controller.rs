use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result, EMPTY_BUCKET_NAME, EMPTY_DATA, OUTPUT_TOO_LARGE};
use crate::format::{Anchor, ImageFormat};
use crate::processor::{self, Resize, DEFAULT_MAX_PIXELS};
use crate::single_flight::SingleFlight;
use crate::storage::backends::BackendConfigs;
use crate::storage::ObjectStore;
use crate::utils::{derivative_key, sniff_content_type};

/// Image bytes together with the content type they should be served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub data: Bytes,
    pub content_type: String,
}

/// An optional point in time after which store calls are abandoned.
#[derive(Debug, Copy, Clone)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| Instant::now() + t))
    }

    async fn bound<T>(self, op: impl Future<Output = T>) -> Result<T> {
        match self.0 {
            Some(deadline) => tokio::time::timeout_at(deadline, op)
                .await
                .map_err(|_| Error::Cancelled),
            None => Ok(op.await),
        }
    }

    /// Bounds a store call, wrapping its failure in [`Error::Store`].
    async fn run<T>(self, op: impl Future<Output = anyhow::Result<T>>) -> Result<T> {
        self.bound(op).await?.map_err(Error::Store)
    }
}

/// A handle on one bucket of the object store which resolves, computes and
/// caches resized derivatives of the images stored in it.
///
/// The store is both the source of originals and the only cache tier, the
/// handle itself holds no per-image state and is cheap to share.
pub struct Bucket {
    storage: Arc<dyn ObjectStore>,
    request_timeout: Option<Duration>,
    limiter: Option<Arc<Semaphore>>,
    flights: Option<SingleFlight>,
    max_pixels: u64,
}

impl Bucket {
    pub fn new(storage: Arc<dyn ObjectStore>) -> Self {
        Self {
            storage,
            request_timeout: None,
            limiter: None,
            flights: None,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    /// Connects to the named bucket of the configured backend.
    ///
    /// An empty name is rejected before the backend is touched.
    pub async fn init(bucket_name: &str, backend: &BackendConfigs) -> Result<Self> {
        if bucket_name.is_empty() {
            return Err(Error::InvalidArgument(EMPTY_BUCKET_NAME));
        }

        let storage = backend.connect(bucket_name).await.map_err(Error::Store)?;
        info!("connected to bucket {}", bucket_name);

        Ok(Self::new(storage))
    }

    pub async fn from_config(cfg: &RuntimeConfig) -> Result<Self> {
        let mut bucket = Self::init(&cfg.bucket, &cfg.backend)
            .await?
            .with_single_flight(cfg.single_flight);

        if let Some(timeout) = cfg.request_timeout() {
            bucket = bucket.with_request_timeout(timeout);
        }

        if let Some(limit) = cfg.max_concurrency {
            bucket = bucket.with_max_concurrency(limit);
        }

        if let Some(limit) = cfg.max_output_pixels {
            bucket = bucket.with_max_output_pixels(limit);
        }

        Ok(bucket)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit)));
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(SingleFlight::new);
        self
    }

    /// Caps the pixel count of computed derivatives, larger requests fail
    /// with [`Error::InvalidArgument`].
    pub fn with_max_output_pixels(mut self, limit: u64) -> Self {
        self.max_pixels = limit;
        self
    }

    #[inline]
    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    /// Returns the image `id`, resized to `width x height` if requested.
    ///
    /// When both dimensions are positive the image is cropped to exactly that
    /// size around `anchor`. When only one is positive the other is derived
    /// from the aspect ratio. When neither is, or the original is a WebP, the
    /// original is returned untouched.
    ///
    /// Computed derivatives are written back under
    /// [`derivative_key`](crate::derivative_key) and served from there on
    /// every later call with the same id and size, whatever the anchor.
    ///
    /// Requests whose output would exceed the configured pixel limit are
    /// rejected with [`Error::InvalidArgument`].
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, id: &str, anchor: Anchor, width: i32, height: i32) -> Result<FetchedImage> {
        let deadline = Deadline::after(self.request_timeout);

        let metadata = deadline
            .run(self.storage.metadata(id))
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let content_type = metadata.content_type;
        let format = ImageFormat::from_content_type(&content_type);

        if (width <= 0 && height <= 0) || format == ImageFormat::WebP {
            let data = self
                .read(deadline, id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            return Ok(FetchedImage { data, content_type });
        }

        let op = Resize::from_request(width, height, anchor);
        if op.requested_pixels() > self.max_pixels {
            return Err(Error::InvalidArgument(OUTPUT_TOO_LARGE));
        }

        let key = derivative_key(id, width, height);
        if let Some(data) = self.read(deadline, &key).await? {
            debug!("serving cached derivative {}", key);
            return Ok(FetchedImage { data, content_type });
        }

        let _flight = match self.flights.as_ref() {
            Some(flights) => {
                let flight = deadline.bound(flights.acquire(&key)).await?;

                // Whoever held the flight before us may have filled it.
                if let Some(data) = self.read(deadline, &key).await? {
                    debug!("serving derivative {} computed by a concurrent request", key);
                    return Ok(FetchedImage { data, content_type });
                }

                Some(flight)
            },
            None => None,
        };

        let data = self
            .compute(deadline, id, format, op)
            .await?;

        self.store(deadline, &key, data.clone(), &content_type).await?;
        info!("cached derivative {} ({} bytes)", key, data.len());

        Ok(FetchedImage { data, content_type })
    }

    /// Stores `data` under a freshly generated id and returns that id.
    #[instrument(skip(self, data), level = "debug")]
    pub async fn add(&self, data: impl Into<Bytes>) -> Result<String> {
        let data = data.into();
        if data.is_empty() {
            return Err(Error::InvalidArgument(EMPTY_DATA));
        }

        let id = Uuid::new_v4().to_string();
        self.save(&id, data).await?;

        Ok(id)
    }

    /// Creates or replaces the object at `key`, recording the content type
    /// detected from the payload.
    pub async fn save(&self, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let content_type = sniff_content_type(&data);
        self.save_with_content_type(key, data, content_type).await
    }

    /// Creates or replaces the object at `key` with an explicit content type.
    #[instrument(skip(self, data), fields(size = data.len()), level = "debug")]
    pub async fn save_with_content_type(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let deadline = Deadline::after(self.request_timeout);
        self.store(deadline, key, data, content_type).await
    }

    async fn store(&self, deadline: Deadline, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidArgument(EMPTY_DATA));
        }

        deadline.run(self.storage.store(key, data, content_type)).await
    }

    /// Reads the whole object at `key`, `None` if it does not exist.
    async fn read(&self, deadline: Deadline, key: &str) -> Result<Option<Bytes>> {
        deadline.run(read_all(self.storage.as_ref(), key)).await
    }

    async fn compute(&self, deadline: Deadline, id: &str, format: ImageFormat, op: Resize) -> Result<Bytes> {
        let original = self
            .read(deadline, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let _permit = match self.limiter.as_ref() {
            Some(limiter) => Some(
                deadline
                    .run(async { limiter.clone().acquire_owned().await.map_err(anyhow::Error::from) })
                    .await?,
            ),
            None => None,
        };

        processor::process(original, format, op, self.max_pixels).await
    }
}

async fn read_all(storage: &dyn ObjectStore, key: &str) -> anyhow::Result<Option<Bytes>> {
    let mut reader = match storage.open_reader(key).await? {
        Some(reader) => reader,
        None => return Ok(None),
    };

    let mut buff = Vec::new();
    reader.read_to_end(&mut buff).await?;
    Ok(Some(Bytes::from(buff)))
}
