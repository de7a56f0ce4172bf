// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Destructive region blurring.
//!
//! The region is blurred several times in a row with a large Gaussian kernel,
//! then written back over the frame. Pixels outside the region are never
//! touched.

use image::{Rgb, Rgb32FImage, RgbImage, imageops};
use imageproc::filter::separable_filter_equal;

use crate::config::MaskingConfig;
use crate::results::BBox;

/// Sigma used for a kernel of `size` taps when none is given.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_sigma(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel with `size` taps.
///
/// Even sizes are bumped to the next odd size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(size: u32, sigma: Option<f32>) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = sigma.filter(|s| *s > 0.0).unwrap_or_else(|| default_sigma(size));
    let center = (size / 2) as f32;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Applies repeated Gaussian blur over rectangles of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskApplier {
    kernel: Vec<f32>,
    iterations: u32,
}

impl Default for MaskApplier {
    fn default() -> Self {
        Self::from_config(&MaskingConfig::default())
    }
}

impl MaskApplier {
    /// Create an applier.
    ///
    /// # Arguments
    ///
    /// * `kernel_size` - Gaussian kernel size in pixels.
    /// * `iterations` - Number of blur passes.
    #[must_use]
    pub fn new(kernel_size: u32, iterations: u32) -> Self {
        Self {
            kernel: gaussian_kernel(kernel_size, None),
            iterations,
        }
    }

    /// Create an applier from the pipeline configuration.
    #[must_use]
    pub fn from_config(config: &MaskingConfig) -> Self {
        Self::new(config.blur_kernel, config.blur_iterations)
    }

    /// Blur `rect` in place.
    ///
    /// The rectangle is clipped to the frame first.
    ///
    /// # Returns
    ///
    /// `false` without touching the frame if the clipped rectangle is empty.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply(&self, image: &mut RgbImage, rect: BBox) -> bool {
        let clipped = rect.clamp_to(image.width(), image.height());
        if clipped.x1 >= clipped.x2 || clipped.y1 >= clipped.y2 {
            return false;
        }

        let (x, y) = (clipped.x1 as u32, clipped.y1 as u32);
        let (w, h) = (clipped.width() as u32, clipped.height() as u32);
        let roi = imageops::crop_imm(&*image, x, y, w, h).to_image();

        let mut buf = Rgb32FImage::from_fn(w, h, |px, py| {
            Rgb(roi.get_pixel(px, py).0.map(f32::from))
        });
        for _ in 0..self.iterations {
            buf = separable_filter_equal(&buf, &self.kernel);
            // Quantize each pass like an 8-bit image would be
            for v in buf.iter_mut() {
                *v = v.round().clamp(0.0, 255.0);
            }
        }

        let blurred = RgbImage::from_fn(w, h, |px, py| {
            Rgb(buf.get_pixel(px, py).0.map(|v| v as u8))
        });
        imageops::replace(image, &blurred, i64::from(x), i64::from(y));
        true
    }
}
