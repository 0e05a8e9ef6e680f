//! An on-demand derivative cache for images kept in an object store.
//!
//! A [`Bucket`] serves originals as they were uploaded and, when a size is
//! requested, computes the resized variant once, writes it back to the same
//! store under a size-derived key and serves it from there afterwards.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod processor;
pub mod single_flight;
pub mod storage;
pub mod utils;


pub use config::RuntimeConfig;
pub use controller::{Bucket, FetchedImage};
pub use error::{Error, Result};
pub use format::{Anchor, ImageFormat};
pub use storage::backends::BackendConfigs;
pub use storage::{ObjectMetadata, ObjectReader, ObjectStore};
pub use utils::derivative_key;
