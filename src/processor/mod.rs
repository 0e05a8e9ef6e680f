use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use bytes::Bytes;
use futures::channel::oneshot;
use tracing::Span;
use tracing_futures::Instrument;

use crate::error::{Error, Result, OUTPUT_TOO_LARGE};
use crate::format::ImageFormat;

pub mod decoder;
pub mod encoder;
pub mod resizer;

pub use resizer::{Resize, DEFAULT_MAX_PIXELS};

/// Decodes `data`, applies `op` and re-encodes the result as `format`.
///
/// The work is CPU bound so it is handed to the rayon pool, the returned
/// future only waits for the result. Operations that would materialise an
/// image larger than `max_pixels` are refused.
pub async fn process(data: Bytes, format: ImageFormat, op: Resize, max_pixels: u64) -> Result<Bytes> {
    let span = debug_span!("process", ?op, %format, input_size = data.len());
    offload(span, move || process_blocking(&data, &format, op, max_pixels)).await
}

/// Runs `work` on the rayon pool. A panic inside `work` is reported as
/// [`Error::Processing`] rather than unwinding through the pool.
async fn offload<T, F>(span: Span, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    let worker_span = span.clone();
    rayon::spawn(move || {
        let _entered = worker_span.enter();
        let result = panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
            let msg = panic_message(payload);
            error!("image worker panicked: {}", msg);
            Err(Error::Processing(msg))
        });
        let _ = tx.send(result);
    });

    rx.instrument(span)
        .await
        .map_err(|_| Error::Processing("worker exited without a result".to_string()))?
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| "worker panicked".to_string()),
    }
}

pub fn process_blocking(data: &[u8], format: &ImageFormat, op: Resize, max_pixels: u64) -> Result<Bytes> {
    let instant = Instant::now();

    let original = decoder::decode(data).map_err(Error::Decode)?;
    if op.peak_pixels(original.width(), original.height()) > max_pixels {
        return Err(Error::InvalidArgument(OUTPUT_TOO_LARGE));
    }

    let modified = resizer::apply(op, &original);

    let target = format
        .encoding_format()
        .ok_or_else(|| Error::UnsupportedContentType(format.to_string()))?;
    let encoded = encoder::encode_to(&modified, target).map_err(Error::Encode)?;

    debug!(
        "processed image into {} bytes in {:?}",
        encoded.len(),
        instant.elapsed(),
    );

    Ok(encoded)
}
