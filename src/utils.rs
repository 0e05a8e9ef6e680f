/// The fallback content type for payloads that are not recognisable images.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The store key a derivative of `id` at the given size is cached under.
///
/// Sizes are formatted as the literal signed values that were requested, so
/// `("cat", -5, 10)` maps to `cat--5-10`. The anchor is deliberately not part
/// of the key.
#[inline]
pub fn derivative_key(id: &str, width: i32, height: i32) -> String {
    format!("{}-{}-{}", id, width, height)
}

/// Detects the content type of a payload from its magic bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivative_key_format() {
        assert_eq!(derivative_key("cat", 150, 150), "cat-150-150");
        assert_eq!(derivative_key("cat", 0, 64), "cat-0-64");
        assert_eq!(derivative_key("cat", -5, 10), "cat--5-10");
    }

    #[test]
    fn test_sniff_content_type() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_content_type(&png), "image/png");

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
        assert_eq!(sniff_content_type(&jpeg), "image/jpeg");

        assert_eq!(sniff_content_type(b"GIF89a......"), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\x10\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_content_type(b"hello world"), OCTET_STREAM);
    }
}
