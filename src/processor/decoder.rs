use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageReader, ImageResult};

/// Decodes an image, guessing its format from the payload, and rotates/flips
/// it upright according to any embedded EXIF orientation.
pub fn decode(data: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_decoder()?;

    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    Ok(img)
}
