// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Masking configuration.
//!
//! This module defines the [`MaskingConfig`] struct, which controls the thresholds
//! used by every stage of the pipeline: person detection, exposure classification,
//! region padding, blur strength and identity matching.

use crate::identity::SimilarityMetric;

/// Configuration for the exposure-masking pipeline.
///
/// It uses a builder pattern for convenient construction.
///
/// # Example
///
/// ```rust
/// use exposure_mask::{MaskingConfig, SimilarityMetric};
///
/// let config = MaskingConfig::new()
///     .with_person_confidence(0.6)
///     .with_similarity(SimilarityMetric::Euclidean)
///     .with_match_threshold(0.6)
///     .with_blur(151, 5);
/// ```
#[derive(Debug, Clone)]
pub struct MaskingConfig {
    /// Minimum detector confidence for a person box to be kept.
    pub person_confidence: f32,
    /// `IoU` threshold for Non-Maximum Suppression in the ONNX detectors.
    pub iou_threshold: f32,
    /// Radius in pixels of the disk sampled around each landmark.
    pub exposure_radius: u32,
    /// Fraction of skin pixels in the disk at which a landmark counts as exposed.
    pub exposure_threshold: f32,
    /// Wrist landmarks closer than `factor * radius` force a "covered" result.
    pub wrist_suppression_factor: f32,
    /// Horizontal padding added to each region cluster.
    pub horizontal_margin: i32,
    /// Vertical padding added to each region cluster.
    pub vertical_margin: i32,
    /// Extra headroom above the nipple landmarks for the upper cluster.
    pub nipple_top_extension: i32,
    /// Gaussian kernel size used by the mask applier (odd).
    pub blur_kernel: u32,
    /// Number of blur passes over a masked region.
    pub blur_iterations: u32,
    /// Embedding comparison strategy for face matching.
    pub similarity: SimilarityMetric,
    /// Explicit match threshold; `None` uses the metric's default.
    pub match_threshold: Option<f32>,
    /// Whether to draw boxes, labels and exposure markers on diagnostic images.
    pub diagnostics: bool,
    /// Number of intra-op threads for ONNX Runtime (`0` = auto).
    pub num_threads: usize,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            person_confidence: 0.5,
            iou_threshold: 0.45,
            exposure_radius: 20,
            exposure_threshold: 0.5,
            wrist_suppression_factor: 1.5,
            horizontal_margin: 50,
            vertical_margin: 30,
            nipple_top_extension: 80,
            blur_kernel: 151,
            blur_iterations: 5,
            similarity: SimilarityMetric::Cosine,
            match_threshold: None,
            diagnostics: true,
            num_threads: 0,
        }
    }
}

impl MaskingConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the person detection confidence floor.
    #[must_use]
    pub const fn with_person_confidence(mut self, threshold: f32) -> Self {
        self.person_confidence = threshold;
        self
    }

    /// Set the IoU threshold for Non-Maximum Suppression (NMS).
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the sampling radius and the skin fraction needed for "exposed".
    ///
    /// # Arguments
    ///
    /// * `radius` - Disk radius in pixels.
    /// * `threshold` - Minimum skin fraction (0.0 to 1.0).
    #[must_use]
    pub const fn with_exposure(mut self, radius: u32, threshold: f32) -> Self {
        self.exposure_radius = radius;
        self.exposure_threshold = threshold;
        self
    }

    /// Set the padding applied around region clusters.
    #[must_use]
    pub const fn with_margins(mut self, horizontal: i32, vertical: i32) -> Self {
        self.horizontal_margin = horizontal;
        self.vertical_margin = vertical;
        self
    }

    /// Set how far the upper cluster may reach above the nipple landmarks.
    #[must_use]
    pub const fn with_top_extension(mut self, pixels: i32) -> Self {
        self.nipple_top_extension = pixels;
        self
    }

    /// Set the wrist suppression distance as a multiple of the exposure radius.
    #[must_use]
    pub const fn with_wrist_suppression(mut self, factor: f32) -> Self {
        self.wrist_suppression_factor = factor;
        self
    }

    /// Set the blur kernel size and number of passes.
    ///
    /// # Arguments
    ///
    /// * `kernel` - Gaussian kernel size in pixels.
    /// * `iterations` - How many times the blur is applied.
    #[must_use]
    pub const fn with_blur(mut self, kernel: u32, iterations: u32) -> Self {
        self.blur_kernel = kernel;
        self.blur_iterations = iterations;
        self
    }

    /// Select the embedding comparison strategy.
    #[must_use]
    pub const fn with_similarity(mut self, metric: SimilarityMetric) -> Self {
        self.similarity = metric;
        self
    }

    /// Override the metric's default match threshold.
    #[must_use]
    pub const fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = Some(threshold);
        self
    }

    /// Enable or disable diagnostic drawing.
    #[must_use]
    pub const fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Set the number of threads for inference.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// The match threshold in effect for the configured metric.
    #[must_use]
    pub fn effective_match_threshold(&self) -> f32 {
        self.match_threshold
            .unwrap_or_else(|| self.similarity.default_threshold())
    }
}
