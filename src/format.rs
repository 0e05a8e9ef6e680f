use std::fmt;

use strum::{Display, EnumIter, EnumString};

/// The format of a stored image, as derived from its recorded content type.
///
/// Only PNG, JPEG and GIF can be re-encoded. WebP originals are always served
/// as-is and anything else is carried along verbatim so it can be reported
/// back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Other(String),
}

impl ImageFormat {
    /// Classifies a recorded content type. Only the exact canonical strings
    /// are recognised, any variation is [`ImageFormat::Other`].
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "image/png" => Self::Png,
            "image/jpeg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::WebP,
            _ => Self::Other(content_type.to_string()),
        }
    }

    pub fn as_content_type(&self) -> &str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Other(other) => other.as_str(),
        }
    }

    /// The codec used to re-encode derivatives of this format, if any.
    pub(crate) fn encoding_format(&self) -> Option<image::ImageFormat> {
        match self {
            Self::Png => Some(image::ImageFormat::Png),
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::WebP | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_content_type())
    }
}

/// The reference point that survives a fill-crop.
///
/// The declaration order matches the conventional numeric anchor values
/// (`0` is center, `8` is bottom-right).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}
