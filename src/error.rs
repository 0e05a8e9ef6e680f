use thiserror::Error;

/// Errors produced while resolving, computing or persisting images.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller supplied an unusable argument, e.g. an empty bucket name
    /// or an empty payload.
    #[error("{0}")]
    InvalidArgument(&'static str),

    /// The requested original image does not exist in the store.
    #[error("image {0} not found")]
    NotFound(String),

    /// The stored original could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The transformed image could not be re-encoded.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("{0} is not supported. Only image/png, image/jpeg, image/gif")]
    UnsupportedContentType(String),

    /// Any failure reported by the underlying object store.
    #[error("object store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// The image worker stopped without producing a result, e.g. a codec
    /// panicked.
    #[error("image processing failed: {0}")]
    Processing(String),

    /// The request deadline elapsed before the operation completed.
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) const EMPTY_BUCKET_NAME: &str = "bucket name is empty";
pub(crate) const EMPTY_DATA: &str = "data is empty";
pub(crate) const OUTPUT_TOO_LARGE: &str = "requested size is too large";
