// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose landmark estimation on person crops.
//!
//! Expects a landmark model that outputs `[1, K * 5]` with `(x, y, z,
//! visibility, presence)` per landmark in input pixel space, K >= 33, and
//! optionally a `[1, 1]` pose presence score.

use std::path::Path;

use image::RgbImage;

use super::PoseEstimator;
use super::session::{OnnxSession, RawOutput};
use crate::error::Result;
use crate::landmarks::{PRIMARY_NAMES, PosePoint};
use crate::preprocessing::{Normalization, TensorLayout, resize_to_tensor};

/// Values per landmark in the landmark output.
const LANDMARK_STRIDE: usize = 5;

const NUM_PRIMARY: usize = PRIMARY_NAMES.len();

/// Decode raw pose outputs into crop-space points.
///
/// # Arguments
///
/// * `outputs` - Every model output.
/// * `crop_size` - Crop (width, height).
/// * `input_size` - Model input (height, width).
/// * `presence_threshold` - Minimum pose presence score.
///
/// # Returns
///
/// `None` when no landmark output exists or presence is below threshold.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn decode_pose(
    outputs: &[RawOutput],
    crop_size: (u32, u32),
    input_size: (usize, usize),
    presence_threshold: f32,
) -> Option<Vec<PosePoint>> {
    if let Some((flag, _)) = outputs.iter().find(|(data, _)| data.len() == 1) {
        let raw = flag[0];
        let score = if (0.0..=1.0).contains(&raw) {
            raw
        } else {
            1.0 / (1.0 + (-raw).exp())
        };
        if score < presence_threshold {
            return None;
        }
    }

    let (landmarks, _) = outputs.iter().find(|(data, shape)| {
        shape.len() == 2 && data.len() >= NUM_PRIMARY * LANDMARK_STRIDE && data.len() % LANDMARK_STRIDE == 0
    })?;

    let (in_h, in_w) = (input_size.0 as f32, input_size.1 as f32);
    let (crop_w, crop_h) = (crop_size.0 as f32, crop_size.1 as f32);

    let points = landmarks
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_PRIMARY)
        .zip(0_u32..)
        .filter_map(|(v, id)| {
            // Normalize, then scale like integer pixel lookup on the crop
            let (x, y) = (v[0] / in_w * crop_w, v[1] / in_h * crop_h);
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            Some(PosePoint::new(id, x as i32, y as i32))
        })
        .collect();
    Some(points)
}

/// Pose landmark model over an ONNX session.
#[derive(Debug)]
pub struct OnnxPoseEstimator {
    session: OnnxSession,
    input_size: (usize, usize),
    layout: TensorLayout,
    presence_threshold: f32,
}

impl OnnxPoseEstimator {
    /// Load a 256x256 NHWC landmark model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        Ok(Self {
            session: OnnxSession::load(path, num_threads)?,
            input_size: (256, 256),
            layout: TensorLayout::Nhwc,
            presence_threshold: 0.5,
        })
    }

    /// Set the input size (height, width) and layout.
    #[must_use]
    pub const fn with_input(mut self, input_size: (usize, usize), layout: TensorLayout) -> Self {
        self.input_size = input_size;
        self.layout = layout;
        self
    }

    /// Set the minimum presence score.
    #[must_use]
    pub const fn with_presence_threshold(mut self, threshold: f32) -> Self {
        self.presence_threshold = threshold;
        self
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn estimate(&mut self, crop: &RgbImage) -> Result<Option<Vec<PosePoint>>> {
        if crop.width() == 0 || crop.height() == 0 {
            return Ok(None);
        }
        let tensor = resize_to_tensor(crop, self.input_size, self.layout, Normalization::UNIT)?;
        let outputs = self.session.run(&tensor)?;
        Ok(decode_pose(
            &outputs,
            crop.dimensions(),
            self.input_size,
            self.presence_threshold,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmark_output(count: usize) -> RawOutput {
        let mut data = Vec::with_capacity(count * LANDMARK_STRIDE);
        for i in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let v = i as f32;
            data.extend_from_slice(&[v * 4.0, 128.0, 0.0, 1.0, 1.0]);
        }
        (data, vec![1, count * LANDMARK_STRIDE])
    }

    #[test]
    fn test_decode_scales_to_crop() {
        let outputs = vec![landmark_output(39), (vec![0.9], vec![1, 1])];
        let points = decode_pose(&outputs, (100, 50), (256, 256), 0.5).unwrap();

        assert_eq!(points.len(), 33);
        assert_eq!(points[0], PosePoint::new(0, 0, 25));
        // 10 * 4 / 256 * 100 = 15.6
        assert_eq!(points[10], PosePoint::new(10, 15, 25));
        assert_eq!(points[32].id, 32);
    }

    #[test]
    fn test_low_presence_gives_none() {
        let outputs = vec![landmark_output(33), (vec![0.2], vec![1, 1])];
        assert!(decode_pose(&outputs, (100, 100), (256, 256), 0.5).is_none());

        // Logits are squashed first
        let outputs = vec![landmark_output(33), (vec![-3.0], vec![1, 1])];
        assert!(decode_pose(&outputs, (100, 100), (256, 256), 0.5).is_none());
        let outputs = vec![landmark_output(33), (vec![3.0], vec![1, 1])];
        assert!(decode_pose(&outputs, (100, 100), (256, 256), 0.5).is_some());
    }

    #[test]
    fn test_non_finite_points_are_dropped() {
        let (mut data, shape) = landmark_output(33);
        data[2 * LANDMARK_STRIDE] = f32::NAN;
        data[5 * LANDMARK_STRIDE + 1] = f32::INFINITY;
        let points = decode_pose(&[(data, shape)], (100, 100), (256, 256), 0.5).unwrap();

        assert_eq!(points.len(), 31);
        assert!(points.iter().all(|p| p.id != 2 && p.id != 5));
        assert_eq!(points[2].id, 3);
    }

    #[test]
    fn test_missing_landmarks_gives_none() {
        let outputs = vec![(vec![0.0; 117], vec![1, 117])];
        assert!(decode_pose(&outputs, (10, 10), (256, 256), 0.5).is_none());
    }
}
