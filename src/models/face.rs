// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Face detection plus identity embedding.

use std::path::Path;

use image::RgbImage;

use super::detector::YoloDetector;
use super::session::{OnnxSession, RawOutput};
use super::FaceAnalyzer;
use crate::error::Result;
use crate::gallery::l2_normalize;
use crate::preprocessing::{Normalization, TensorLayout, crop_box, resize_to_tensor};
use crate::results::FaceRecord;

/// Embedding model input side length.
pub const FACE_SIZE: usize = 112;

/// Take the first output as the embedding and normalize it.
///
/// Returns an empty vector when there is no usable output.
#[must_use]
pub fn embedding_from_outputs(outputs: &[RawOutput]) -> Vec<f32> {
    let Some((data, _)) = outputs.first() else {
        return Vec::new();
    };
    if data.iter().any(|v| !v.is_finite()) {
        return Vec::new();
    }
    let mut embedding = data.clone();
    l2_normalize(&mut embedding);
    embedding
}

/// Face analyzer built from a face detector and an embedding model.
#[derive(Debug)]
pub struct OnnxFaceAnalyzer {
    detector: YoloDetector,
    embedder: OnnxSession,
}

impl OnnxFaceAnalyzer {
    /// Load the face detector and embedding models.
    ///
    /// # Errors
    ///
    /// Returns an error if either model cannot be loaded.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        detector: P,
        embedder: Q,
        num_threads: usize,
    ) -> Result<Self> {
        Ok(Self {
            detector: YoloDetector::load_single_class(detector, num_threads)?,
            embedder: OnnxSession::load(embedder, num_threads)?,
        })
    }

    fn embed(&mut self, face: &RgbImage) -> Result<Vec<f32>> {
        let tensor = resize_to_tensor(
            face,
            (FACE_SIZE, FACE_SIZE),
            TensorLayout::Nchw,
            Normalization::SYMMETRIC,
        )?;
        let outputs = self.embedder.run(&tensor)?;
        Ok(embedding_from_outputs(&outputs))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<FaceRecord>> {
        let detections = self.detector.detect(frame)?;
        let mut faces = Vec::with_capacity(detections.len());
        for det in detections {
            let embedding = match crop_box(frame, det.bbox) {
                Some(crop) => self.embed(&crop)?,
                None => Vec::new(),
            };
            faces.push(FaceRecord::new(det.bbox, embedding));
        }
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_normalized() {
        let outputs = vec![(vec![3.0, 0.0, 4.0], vec![1, 3])];
        let e = embedding_from_outputs(&outputs);
        assert!((e[0] - 0.6).abs() < 1e-6);
        assert!((e[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_missing_or_invalid_embedding_is_empty() {
        assert!(embedding_from_outputs(&[]).is_empty());
        assert!(embedding_from_outputs(&[(vec![1.0, f32::NAN], vec![1, 2])]).is_empty());
    }
}
