// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model capabilities used by the pipeline.
//!
//! The pipeline only sees the four traits below. The ONNX Runtime adapters in
//! the submodules implement them; tests substitute fixed doubles.

pub mod detector;
pub mod face;
pub mod pose;
pub mod segmentation;
pub mod session;

use std::path::PathBuf;

use image::RgbImage;

use crate::config::MaskingConfig;
use crate::error::Result;
use crate::landmarks::PosePoint;
use crate::results::{BBox, FaceRecord};
use crate::skin::LabelMap;

pub use detector::YoloDetector;
pub use face::OnnxFaceAnalyzer;
pub use pose::OnnxPoseEstimator;
pub use segmentation::OnnxSegmenter;
pub use session::OnnxSession;

/// A detected box with its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box in frame coordinates.
    pub bbox: BBox,
    /// Detection confidence.
    pub confidence: f32,
}

impl Detection {
    /// Create a detection.
    #[must_use]
    pub const fn new(bbox: BBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

/// Finds people in a frame.
pub trait PersonDetector {
    /// Detect persons in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect_persons(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

/// Estimates body pose on a single-person crop.
pub trait PoseEstimator {
    /// Estimate the 33 primary landmarks in crop pixel coordinates.
    ///
    /// Returns `Ok(None)` when no pose is found.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn estimate(&mut self, crop: &RgbImage) -> Result<Option<Vec<PosePoint>>>;
}

/// Produces a per-pixel person segmentation.
pub trait PersonSegmenter {
    /// Segment `frame`; label `0` is background. The map may have any size.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn segment(&mut self, frame: &RgbImage) -> Result<LabelMap>;
}

/// Detects faces and computes their identity embeddings.
pub trait FaceAnalyzer {
    /// Analyze every face in `frame`.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn analyze(&mut self, frame: &RgbImage) -> Result<Vec<FaceRecord>>;
}

/// The four model capabilities the pipeline runs on.
pub struct Capabilities {
    /// Person detector.
    pub detector: Box<dyn PersonDetector>,
    /// Pose estimator.
    pub pose: Box<dyn PoseEstimator>,
    /// Person segmenter.
    pub segmenter: Box<dyn PersonSegmenter>,
    /// Face analyzer.
    pub faces: Box<dyn FaceAnalyzer>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Paths of the ONNX models backing [`Capabilities`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// YOLO detection model (COCO classes, person = 0).
    pub detector: PathBuf,
    /// Pose landmark model.
    pub pose: PathBuf,
    /// Person segmentation model.
    pub segmenter: PathBuf,
    /// Single-class YOLO face detection model.
    pub face_detector: PathBuf,
    /// 112x112 face embedding model.
    pub face_embedder: PathBuf,
}

impl ModelPaths {
    /// Load every model with the configured thresholds and thread count.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoadError` if any model cannot be loaded.
    pub fn load(&self, config: &MaskingConfig) -> Result<Capabilities> {
        let threads = config.num_threads;
        Ok(Capabilities {
            detector: Box::new(
                YoloDetector::load(&self.detector, threads)?
                    .with_confidence(config.person_confidence)
                    .with_iou(config.iou_threshold),
            ),
            pose: Box::new(OnnxPoseEstimator::load(&self.pose, threads)?),
            segmenter: Box::new(OnnxSegmenter::load(&self.segmenter, threads)?),
            faces: Box::new(OnnxFaceAnalyzer::load(
                &self.face_detector,
                &self.face_embedder,
                threads,
            )?),
        })
    }
}
