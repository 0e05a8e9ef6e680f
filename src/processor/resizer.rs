use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::format::Anchor;

/// Filter used for every resampling operation.
const FILTER: FilterType = FilterType::Lanczos3;

/// Sources at least this large in both dimensions are cropped to the target
/// aspect ratio before being scaled, smaller sources are scaled first so the
/// crop happens on the larger intermediate.
const CROP_FIRST_THRESHOLD: u32 = 100;

/// The default upper bound on the number of pixels of any image materialised
/// while resizing, 8192x8192.
pub const DEFAULT_MAX_PIXELS: u64 = 8192 * 8192;

/// A requested output geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resize {
    /// Scale and crop to exactly `width x height`, keeping the region around
    /// `anchor`.
    Fill { width: u32, height: u32, anchor: Anchor },

    /// Scale preserving the aspect ratio. A missing dimension is derived from
    /// the other one.
    Proportional { width: Option<u32>, height: Option<u32> },
}

impl Resize {
    /// Interprets a raw request, where non-positive values mean "unset".
    pub fn from_request(width: i32, height: i32, anchor: Anchor) -> Self {
        let width = u32::try_from(width).ok().filter(|v| *v > 0);
        let height = u32::try_from(height).ok().filter(|v| *v > 0);

        match (width, height) {
            (Some(width), Some(height)) => Self::Fill { width, height, anchor },
            (width, height) => Self::Proportional { width, height },
        }
    }

    /// A lower bound on [`Resize::peak_pixels`] that needs no source image.
    pub fn requested_pixels(&self) -> u64 {
        match *self {
            Self::Fill { width, height, .. } => pixels(width, height),
            Self::Proportional { width, height } => {
                pixels(width.unwrap_or(1), height.unwrap_or(1))
            },
        }
    }

    /// The size of the largest image allocated while applying this operation
    /// to a `src_w x src_h` source.
    pub fn peak_pixels(&self, src_w: u32, src_h: u32) -> u64 {
        if src_w == 0 || src_h == 0 {
            return 0;
        }

        match *self {
            Self::Fill { width, height, .. } => {
                if src_w >= CROP_FIRST_THRESHOLD && src_h >= CROP_FIRST_THRESHOLD {
                    return pixels(width, height);
                }

                let (w, h) = if is_wider(src_w, src_h, width, height) {
                    proportional_dimensions(src_w, src_h, Some(width), None)
                } else {
                    proportional_dimensions(src_w, src_h, None, Some(height))
                };
                pixels(w, h).max(pixels(width, height))
            },
            Self::Proportional { width, height } => {
                let (w, h) = proportional_dimensions(src_w, src_h, width, height);
                pixels(w, h)
            },
        }
    }
}

#[inline]
fn pixels(width: u32, height: u32) -> u64 {
    width as u64 * height as u64
}

/// Whether a `width x height` target is relatively wider than the source.
#[inline]
fn is_wider(src_w: u32, src_h: u32, width: u32, height: u32) -> bool {
    (src_w as f64 / src_h as f64) < (width as f64 / height as f64)
}

pub fn apply(op: Resize, img: &DynamicImage) -> DynamicImage {
    match op {
        Resize::Fill { width, height, anchor } => fill(img, width, height, anchor),
        Resize::Proportional { width, height } => resize(img, width, height),
    }
}

/// Resizes and crops `img` so the result is exactly `width x height`.
pub fn fill(img: &DynamicImage, width: u32, height: u32, anchor: Anchor) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return img.clone();
    }

    if (src_w, src_h) == (width, height) {
        return img.clone();
    }

    let wider = is_wider(src_w, src_h, width, height);

    if src_w >= CROP_FIRST_THRESHOLD && src_h >= CROP_FIRST_THRESHOLD {
        let cropped = if wider {
            let crop_h = (src_w as f64 * height as f64 / width as f64).max(1.0) + 0.5;
            crop_anchor(img, src_w, crop_h as u32, anchor)
        } else {
            let crop_w = (src_h as f64 * width as f64 / height as f64).max(1.0) + 0.5;
            crop_anchor(img, crop_w as u32, src_h, anchor)
        };

        return cropped.resize_exact(width, height, FILTER);
    }

    let scaled = if wider {
        resize(img, Some(width), None)
    } else {
        resize(img, None, Some(height))
    };
    crop_anchor(&scaled, width, height, anchor)
}

/// Scales `img` preserving its aspect ratio, with a minimum of one pixel in
/// the derived dimension.
pub fn resize(img: &DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return img.clone();
    }

    let (dst_w, dst_h) = proportional_dimensions(src_w, src_h, width, height);
    if (dst_w, dst_h) == (src_w, src_h) {
        return img.clone();
    }

    img.resize_exact(dst_w, dst_h, FILTER)
}

fn proportional_dimensions(src_w: u32, src_h: u32, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, derive_dimension(w, src_h, src_w)),
        (None, Some(h)) => (derive_dimension(h, src_w, src_h), h),
        (None, None) => (src_w, src_h),
    }
}

#[inline]
fn derive_dimension(known: u32, numerator: u32, denominator: u32) -> u32 {
    let derived = known as f64 * numerator as f64 / denominator as f64;
    (derived + 0.5).floor().max(1.0) as u32
}

/// Cuts a `width x height` region out of `img` positioned by `anchor`,
/// clamped to the image bounds.
pub fn crop_anchor(img: &DynamicImage, width: u32, height: u32, anchor: Anchor) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    let (x, y) = anchor_point(src_w, src_h, width, height, anchor);

    // Intersect the requested region with the image bounds.
    let x0 = x.clamp(0, src_w as i64);
    let y0 = y.clamp(0, src_h as i64);
    let x1 = (x + width as i64).clamp(0, src_w as i64);
    let y1 = (y + height as i64).clamp(0, src_h as i64);

    img.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
}

/// The top-left corner of a `width x height` region inside a
/// `src_w x src_h` image for the given anchor.
fn anchor_point(src_w: u32, src_h: u32, width: u32, height: u32, anchor: Anchor) -> (i64, i64) {
    let (src_w, src_h) = (src_w as i64, src_h as i64);
    let (w, h) = (width as i64, height as i64);

    let center_x = (src_w - w) / 2;
    let center_y = (src_h - h) / 2;
    let right = src_w - w;
    let bottom = src_h - h;

    match anchor {
        Anchor::TopLeft => (0, 0),
        Anchor::Top => (center_x, 0),
        Anchor::TopRight => (right, 0),
        Anchor::Left => (0, center_y),
        Anchor::Right => (right, center_y),
        Anchor::BottomLeft => (0, bottom),
        Anchor::Bottom => (center_x, bottom),
        Anchor::BottomRight => (right, bottom),
        Anchor::Center => (center_x, center_y),
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use strum::IntoEnumIterator;

    use super::*;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
    }

    /// A 300x100 image whose left third is red, middle green and right blue.
    fn striped() -> DynamicImage {
        let img = RgbaImage::from_fn(300, 100, |x, _| match x {
            0..=99 => Rgba([255, 0, 0, 255]),
            100..=199 => Rgba([0, 255, 0, 255]),
            _ => Rgba([0, 0, 255, 255]),
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_request_interpretation() {
        assert_eq!(
            Resize::from_request(150, 150, Anchor::Top),
            Resize::Fill { width: 150, height: 150, anchor: Anchor::Top },
        );
        assert_eq!(
            Resize::from_request(64, 0, Anchor::Top),
            Resize::Proportional { width: Some(64), height: None },
        );
        assert_eq!(
            Resize::from_request(-5, 32, Anchor::Center),
            Resize::Proportional { width: None, height: Some(32) },
        );
    }

    #[test]
    fn test_fill_exact_dimensions_for_every_anchor() {
        for (w, h) in [(300, 200), (40, 90), (150, 150)] {
            let img = blank(w, h);
            for anchor in Anchor::iter() {
                let out = fill(&img, 150, 150, anchor);
                assert_eq!(out.dimensions(), (150, 150), "source {}x{} anchor {}", w, h, anchor);
            }
        }
    }

    #[test]
    fn test_fill_respects_anchor() {
        let img = striped();

        let left = fill(&img, 100, 100, Anchor::Left);
        assert_eq!(left.get_pixel(50, 50), Rgba([255, 0, 0, 255]));

        let center = fill(&img, 100, 100, Anchor::Center);
        assert_eq!(center.get_pixel(50, 50), Rgba([0, 255, 0, 255]));

        let right = fill(&img, 100, 100, Anchor::BottomRight);
        assert_eq!(right.get_pixel(50, 50), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_proportional_resize() {
        let img = blank(400, 200);

        assert_eq!(resize(&img, Some(100), None).dimensions(), (100, 50));
        assert_eq!(resize(&img, None, Some(50)).dimensions(), (100, 50));
        assert_eq!(resize(&img, None, None).dimensions(), (400, 200));

        // The derived side never collapses below one pixel.
        assert_eq!(resize(&img, None, Some(1)).dimensions(), (2, 1));
        assert_eq!(resize(&blank(1000, 2), Some(10), None).dimensions(), (10, 1));
    }

    #[test]
    fn test_pixel_estimates() {
        let fill = Resize::from_request(150, 100, Anchor::Center);
        assert_eq!(fill.requested_pixels(), 15_000);
        assert_eq!(fill.peak_pixels(320, 200), 15_000);

        // Small sources are scaled before cropping, the intermediate is larger.
        assert_eq!(fill.peak_pixels(10, 50), 150 * 750);

        let by_width = Resize::from_request(400_000, 0, Anchor::Center);
        assert_eq!(by_width.requested_pixels(), 400_000);
        assert_eq!(by_width.peak_pixels(1, 400), 400_000 * 160_000_000);

        let huge = Resize::from_request(i32::MAX, i32::MAX, Anchor::Center);
        assert!(huge.requested_pixels() > DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn test_crop_anchor_clamps_to_bounds() {
        let img = blank(50, 50);
        assert_eq!(crop_anchor(&img, 80, 20, Anchor::Center).dimensions(), (50, 20));
        assert_eq!(crop_anchor(&img, 20, 20, Anchor::BottomRight).dimensions(), (20, 20));
    }
}
