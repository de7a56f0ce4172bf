// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame-global skin candidate mask.
//!
//! A pixel is a skin candidate when it lies inside the person segmentation
//! (label > 0) and its 8-bit HSV value falls in [`SKIN_RANGE`]. Hue uses the
//! 0-180 scale of 8-bit HSV images, so `[0, 35]` spans roughly 0-70 degrees.

use fast_image_resize::{PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{GrayImage, Luma, RgbImage};

use crate::error::{MaskingError, Result};

/// Per-pixel segmentation labels, `0` is background.
pub type LabelMap = GrayImage;

/// Value stored for skin pixels.
pub const SKIN: u8 = 255;

/// Inclusive HSV range, each channel as `[h, s, v]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    /// Lower bound, inclusive.
    pub lower: [u8; 3],
    /// Upper bound, inclusive.
    pub upper: [u8; 3],
}

impl HsvRange {
    /// Check whether an HSV triple lies inside the range.
    #[must_use]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Skin-tone range.
pub const SKIN_RANGE: HsvRange = HsvRange {
    lower: [0, 30, 60],
    upper: [35, 255, 255],
};

/// Convert an RGB pixel to 8-bit HSV (`h` in 0..180, `s` and `v` in 0..=255).
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u8;
    [if h >= 180 { 0 } else { h }, s.round() as u8, v as u8]
}

/// Binary skin mask with the same dimensions as the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinMask {
    mask: GrayImage,
}

impl SkinMask {
    /// Wrap a grayscale image; any nonzero value is treated as skin.
    #[must_use]
    pub fn from_image(mut mask: GrayImage) -> Self {
        for p in mask.pixels_mut() {
            if p[0] != 0 {
                p[0] = SKIN;
            }
        }
        Self { mask }
    }

    /// An all-background mask.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
        }
    }

    /// Mask width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    /// Mask height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Whether the pixel at `(x, y)` is skin; out-of-bounds pixels are not.
    #[must_use]
    pub fn is_skin(&self, x: i64, y: i64) -> bool {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return false;
        };
        x < self.width() && y < self.height() && self.mask.get_pixel(x, y)[0] == SKIN
    }

    /// Number of skin pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] == SKIN).count()
    }

    /// Borrow the underlying image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.mask
    }
}

/// Resize a label map with nearest-neighbour sampling.
fn resize_labels(labels: &LabelMap, width: u32, height: u32) -> Result<LabelMap> {
    let src = Image::from_vec_u8(
        labels.width(),
        labels.height(),
        labels.as_raw().clone(),
        PixelType::U8,
    )
    .map_err(|e| MaskingError::ImageError(format!("Invalid label map: {e}")))?;
    let mut dst = Image::new(width, height, PixelType::U8);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| MaskingError::ImageError(format!("Failed to resize label map: {e}")))?;

    GrayImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| MaskingError::ImageError("Resized label map has wrong size".to_string()))
}

/// Build the skin mask for a frame.
///
/// # Arguments
///
/// * `frame` - RGB frame.
/// * `labels` - Segmentation labels; resized nearest-neighbour to the frame
///   size when the resolutions differ. An empty map means no foreground.
///
/// # Errors
///
/// Returns an error if the label map cannot be resized.
pub fn build_skin_mask(frame: &RgbImage, labels: &LabelMap) -> Result<SkinMask> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 || labels.width() == 0 || labels.height() == 0 {
        return Ok(SkinMask::empty(width, height));
    }

    let resized;
    let labels = if labels.dimensions() == (width, height) {
        labels
    } else {
        resized = resize_labels(labels, width, height)?;
        &resized
    };

    let mask = GrayImage::from_fn(width, height, |x, y| {
        let foreground = labels.get_pixel(x, y)[0] > 0;
        let skin = foreground && SKIN_RANGE.contains(rgb_to_hsv(frame.get_pixel(x, y).0));
        Luma([if skin { SKIN } else { 0 }])
    });

    Ok(SkinMask { mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const SKIN_TONE: [u8; 3] = [220, 170, 140];
    const BLUE: [u8; 3] = [30, 60, 200];

    #[test]
    fn test_rgb_to_hsv() {
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
    }

    #[test]
    fn test_skin_range() {
        // h = 22.5 deg -> 11, s = 93, v = 220
        assert!(SKIN_RANGE.contains(rgb_to_hsv(SKIN_TONE)));
        assert!(!SKIN_RANGE.contains(rgb_to_hsv(BLUE)));
        // Too dark
        assert!(!SKIN_RANGE.contains(rgb_to_hsv([50, 30, 20])));
        // Too desaturated
        assert!(!SKIN_RANGE.contains(rgb_to_hsv([200, 195, 190])));
    }

    #[test]
    fn test_mask_requires_foreground() {
        let frame = RgbImage::from_pixel(4, 4, Rgb(SKIN_TONE));
        let mut labels = LabelMap::new(4, 4);
        labels.put_pixel(1, 1, Luma([1]));
        labels.put_pixel(2, 2, Luma([7]));

        let mask = build_skin_mask(&frame, &labels).unwrap();
        assert_eq!(mask.count(), 2);
        assert!(mask.is_skin(1, 1));
        assert!(mask.is_skin(2, 2));
        assert!(!mask.is_skin(0, 0));
        assert!(!mask.is_skin(-1, 0));
        assert!(!mask.is_skin(4, 0));
    }

    #[test]
    fn test_mask_resizes_labels_nearest() {
        let frame = RgbImage::from_pixel(8, 8, Rgb(SKIN_TONE));
        // Left half foreground at half resolution
        let labels = LabelMap::from_fn(4, 4, |x, _| Luma([u8::from(x < 2)]));

        let mask = build_skin_mask(&frame, &labels).unwrap();
        assert_eq!((mask.width(), mask.height()), (8, 8));
        assert_eq!(mask.count(), 32);
        assert!(mask.is_skin(0, 7));
        assert!(!mask.is_skin(7, 0));
        // Values stay binary
        assert!(mask.as_image().pixels().all(|p| p[0] == 0 || p[0] == SKIN));
    }

    #[test]
    fn test_empty_labels_give_empty_mask() {
        let frame = RgbImage::from_pixel(5, 3, Rgb(SKIN_TONE));
        let mask = build_skin_mask(&frame, &LabelMap::new(0, 0)).unwrap();
        assert_eq!((mask.width(), mask.height()), (5, 3));
        assert_eq!(mask.count(), 0);
    }
}
