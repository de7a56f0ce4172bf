// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for model inference.
//!
//! This module handles resizing, letterbox padding, cropping and
//! normalization of frames into model input tensors.

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{Rgb, RgbImage, imageops};
use ndarray::Array4;

use crate::error::{MaskingError, Result};
use crate::results::BBox;

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Memory layout of an image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `(1, 3, H, W)`
    #[default]
    Nchw,
    /// `(1, H, W, 3)`
    Nhwc,
}

/// Per-channel normalization applied as `(pixel - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Subtracted from each channel.
    pub mean: f32,
    /// Divisor applied after the subtraction.
    pub std: f32,
}

impl Normalization {
    /// Scale to `[0, 1]`.
    pub const UNIT: Self = Self {
        mean: 0.0,
        std: 255.0,
    };

    /// Scale to `[-1, 1]`.
    pub const SYMMETRIC: Self = Self {
        mean: 127.5,
        std: 127.5,
    };
}

/// Result of letterboxing a frame, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Preprocessed image tensor in NCHW format, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Resize an RGB image with bilinear filtering.
///
/// # Errors
///
/// Returns an error if either size is zero or the resize fails.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }
    let src = Image::from_vec_u8(
        image.width(),
        image.height(),
        image.as_raw().clone(),
        PixelType::U8x3,
    )
    .map_err(|e| MaskingError::ImageError(format!("Failed to create source image: {e}")))?;
    let mut dst = Image::new(width, height, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| MaskingError::ImageError(format!("Failed to resize image: {e}")))?;

    RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| MaskingError::ImageError("Failed to create resized buffer".to_string()))
}

/// Letterbox a frame for detection inference.
///
/// The frame is scaled to fit `target_size` with its aspect ratio preserved,
/// centered, and padded with [`LETTERBOX_COLOR`].
///
/// # Arguments
///
/// * `image` - Input frame.
/// * `target_size` - Target size as (height, width).
///
/// # Errors
///
/// Returns an error if the frame is empty or cannot be resized.
pub fn letterbox(image: &RgbImage, target_size: (usize, usize)) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(MaskingError::ImageError("Cannot letterbox an empty frame".to_string()));
    }

    let (new_width, new_height, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_width, orig_height, target_size);

    let resized = resize_rgb(image, new_width.max(1), new_height.max(1))?;

    #[allow(clippy::cast_possible_truncation)]
    let mut canvas = RgbImage::from_pixel(
        target_size.1 as u32,
        target_size.0 as u32,
        Rgb(LETTERBOX_COLOR),
    );
    imageops::replace(&mut canvas, &resized, i64::from(pad_left), i64::from(pad_top));

    #[allow(clippy::cast_precision_loss)]
    let padding = (pad_top as f32, pad_left as f32);

    Ok(PreprocessResult {
        tensor: image_to_tensor(&canvas, TensorLayout::Nchw, Normalization::UNIT),
        orig_shape: (orig_height, orig_width),
        scale,
        padding,
    })
}

/// Stretch a frame to `(height, width)` and convert it to a tensor.
///
/// # Errors
///
/// Returns an error if the frame cannot be resized.
pub fn resize_to_tensor(
    image: &RgbImage,
    target_size: (usize, usize),
    layout: TensorLayout,
    norm: Normalization,
) -> Result<Array4<f32>> {
    #[allow(clippy::cast_possible_truncation)]
    let resized = resize_rgb(image, target_size.1 as u32, target_size.0 as u32)?;
    Ok(image_to_tensor(&resized, layout, norm))
}

/// Calculate letterbox parameters for resizing.
///
/// # Returns
///
/// Tuple containing:
/// 1. `new_width`: Scaled width.
/// 2. `new_height`: Scaled height.
/// 3. `pad_left`: Left padding.
/// 4. `pad_top`: Top padding.
/// 5. `(scale_y, scale_x)`: Scale factors.
fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    #[allow(clippy::cast_precision_loss)]
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    #[allow(clippy::cast_precision_loss)]
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    // Calculate scale to fit within target while maintaining aspect ratio
    let scale = (target_h / orig_h).min(target_w / orig_w);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_w = (orig_w * scale).round() as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_h = (orig_h * scale).round() as u32;

    #[allow(clippy::cast_possible_truncation)]
    let pad_w = (target_size.1 as u32).saturating_sub(new_w);
    #[allow(clippy::cast_possible_truncation)]
    let pad_h = (target_size.0 as u32).saturating_sub(new_h);

    // Center alignment: divide padding equally on both sides
    let pad_left = pad_w / 2;
    let pad_top = pad_h / 2;

    #[allow(clippy::cast_precision_loss)]
    let scale_x = new_w as f32 / orig_w;
    #[allow(clippy::cast_precision_loss)]
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_left, pad_top, (scale_y, scale_x))
}

/// Convert an RGB image to a normalized tensor.
///
/// # Arguments
///
/// * `image` - RGB image to convert.
/// * `layout` - Output memory layout.
/// * `norm` - Normalization applied to every channel.
#[must_use]
pub fn image_to_tensor(image: &RgbImage, layout: TensorLayout, norm: Normalization) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let scale = 1.0 / norm.std;

    match layout {
        TensorLayout::Nchw => {
            let mut tensor = Array4::zeros((1, 3, h, w));
            for (x, y, p) in image.enumerate_pixels() {
                for c in 0..3 {
                    tensor[[0, c, y as usize, x as usize]] = (f32::from(p[c]) - norm.mean) * scale;
                }
            }
            tensor
        }
        TensorLayout::Nhwc => {
            let data: Vec<f32> = image
                .as_raw()
                .iter()
                .map(|&v| (f32::from(v) - norm.mean) * scale)
                .collect();
            // Length always matches h * w * 3
            Array4::from_shape_vec((1, h, w, 3), data).unwrap_or_else(|_| Array4::zeros((1, h, w, 3)))
        }
    }
}

/// Crop a box out of a frame, clamped to the frame.
///
/// Returns `None` when the clamped box is empty.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn crop_box(image: &RgbImage, bbox: BBox) -> Option<RgbImage> {
    let b = bbox.clamp_to(image.width(), image.height());
    if b.width() <= 0 || b.height() <= 0 {
        return None;
    }
    Some(
        imageops::crop_imm(
            image,
            b.x1 as u32,
            b.y1 as u32,
            b.width() as u32,
            b.height() as u32,
        )
        .to_image(),
    )
}

/// Scale coordinates from model output space back to original image space.
///
/// # Arguments
///
/// * `coords` - Coordinates in model space (after letterbox).
/// * `scale` - Scale factors (`scale_y`, `scale_x`) from preprocessing.
/// * `padding` - Padding (`pad_top`, `pad_left`) from preprocessing.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;

    [
        (coords[0] - pad_left) / scale_x, // x1
        (coords[1] - pad_top) / scale_y,  // y1
        (coords[2] - pad_left) / scale_x, // x2
        (coords[3] - pad_top) / scale_y,  // y2
    ]
}

/// Clip coordinates to image bounds.
///
/// # Arguments
///
/// * `coords` - Box coordinates [x1, y1, x2, y2].
/// * `shape` - Image shape (height, width).
#[must_use]
pub const fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    #[allow(clippy::cast_precision_loss)]
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}
