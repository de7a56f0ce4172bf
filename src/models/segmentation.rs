// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Person segmentation into a label map.

use std::path::Path;

use image::{GrayImage, Luma, RgbImage};

use super::PersonSegmenter;
use super::session::OnnxSession;
use crate::error::{MaskingError, Result};
use crate::preprocessing::{Normalization, TensorLayout, resize_to_tensor};
use crate::skin::LabelMap;

/// Convert raw scores into a per-pixel label map.
///
/// Multi-channel outputs take the argmax class. A single channel is treated
/// as a foreground score (sigmoid applied when values look like logits) and
/// thresholded at 0.5. Channels-last is assumed when the last axis is the
/// smallest.
///
/// # Errors
///
/// Returns `InferenceError` for unsupported shapes or mismatched data.
#[allow(clippy::cast_possible_truncation)]
pub fn decode_labels(data: &[f32], shape: &[usize]) -> Result<LabelMap> {
    let (channels, height, width, channels_last) = match shape {
        [1, h, w] => (1, *h, *w, true),
        [1, a, b, c] if c <= a && c <= b => (*c, *a, *b, true),
        [1, c, h, w] => (*c, *h, *w, false),
        _ => {
            return Err(MaskingError::InferenceError(format!(
                "Unsupported segmentation output shape {shape:?}"
            )));
        }
    };
    if channels == 0 || data.len() != channels * height * width {
        return Err(MaskingError::InferenceError(format!(
            "Segmentation output has {} values for shape {shape:?}",
            data.len()
        )));
    }
    let (w, h) = (
        u32::try_from(width).map_err(|_| MaskingError::InferenceError("Mask too wide".to_string()))?,
        u32::try_from(height).map_err(|_| MaskingError::InferenceError("Mask too tall".to_string()))?,
    );

    let at = |c: usize, y: usize, x: usize| {
        if channels_last {
            data[(y * width + x) * channels + c]
        } else {
            data[(c * height + y) * width + x]
        }
    };

    if channels == 1 {
        let logits = data.iter().any(|v| !(0.0..=1.0).contains(v));
        return Ok(GrayImage::from_fn(w, h, |x, y| {
            let v = at(0, y as usize, x as usize);
            let p = if logits { 1.0 / (1.0 + (-v).exp()) } else { v };
            Luma([u8::from(p > 0.5)])
        }));
    }

    Ok(GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        // Reversed so ties resolve to the lowest class
        let best = (0..channels)
            .rev()
            .max_by(|&a, &b| at(a, y, x).total_cmp(&at(b, y, x)))
            .unwrap_or(0);
        Luma([best.min(255) as u8])
    }))
}

/// Segmentation model over an ONNX session.
#[derive(Debug)]
pub struct OnnxSegmenter {
    session: OnnxSession,
    input_size: (usize, usize),
    layout: TensorLayout,
}

impl OnnxSegmenter {
    /// Load a 257x257 NHWC segmentation model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        Ok(Self {
            session: OnnxSession::load(path, num_threads)?,
            input_size: (257, 257),
            layout: TensorLayout::Nhwc,
        })
    }

    /// Set the input size (height, width) and layout.
    #[must_use]
    pub const fn with_input(mut self, input_size: (usize, usize), layout: TensorLayout) -> Self {
        self.input_size = input_size;
        self.layout = layout;
        self
    }
}

impl PersonSegmenter for OnnxSegmenter {
    fn segment(&mut self, frame: &RgbImage) -> Result<LabelMap> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(LabelMap::new(0, 0));
        }
        let tensor = resize_to_tensor(frame, self.input_size, self.layout, Normalization::UNIT)?;
        let outputs = self.session.run(&tensor)?;
        let (data, shape) = outputs
            .first()
            .ok_or_else(|| MaskingError::InferenceError("Segmentation produced no output".to_string()))?;
        decode_labels(data, shape)
    }
}
