use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageResult};

/// JPEG quality used for re-encoded derivatives.
pub const JPEG_QUALITY: u8 = 95;

/// Encodes `img` into the given container format.
///
/// JPEG has no alpha channel so transparency is dropped, GIF is always
/// written from RGBA.
#[inline]
pub fn encode_to(img: &DynamicImage, format: ImageFormat) -> ImageResult<Bytes> {
    let mut buff = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buff, JPEG_QUALITY))?;
        },
        ImageFormat::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buff, format)?;
        },
        other => img.write_to(&mut buff, other)?,
    }

    Ok(Bytes::from(buff.into_inner()))
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, RgbaImage};

    use super::*;

    #[test]
    fn test_encode_each_supported_format() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(16, 8));

        for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Gif] {
            let encoded = encode_to(&img, format).unwrap();
            assert_eq!(image::guess_format(&encoded).unwrap(), format);

            let decoded = image::load_from_memory(&encoded).unwrap();
            assert_eq!(decoded.dimensions(), (16, 8));
        }
    }
}
