use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::storage::backends::BackendConfigs;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// The name of the bucket originals and derivatives live in.
    pub bucket: String,

    /// The set storage backend configuration.
    pub backend: BackendConfigs,

    #[serde(default)]
    /// The deadline in seconds applied to each `get`, `add` or `save`
    /// request. Store calls still in flight when it passes are abandoned.
    ///
    /// Defaults to no deadline.
    pub request_timeout: Option<u64>,

    #[serde(default)]
    /// Coalesce concurrent computations of the same derivative within this
    /// process.
    ///
    /// Without this two requests racing on an uncached size both compute it
    /// and the last write wins, which is harmless but wasteful.
    ///
    /// Defaults to `false`.
    pub single_flight: bool,

    #[serde(default)]
    /// The maximum number of images being transformed at once.
    ///
    /// Defaults to no limit.
    pub max_concurrency: Option<usize>,

    #[serde(default)]
    /// The largest derivative, in pixels, a request may ask for. Requests
    /// above it are rejected before any image is decoded.
    ///
    /// Defaults to 8192x8192.
    pub max_output_pixels: Option<u64>,
}

impl RuntimeConfig {
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("invalid runtime config")
    }

    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_yaml(&raw)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}
