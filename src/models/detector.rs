// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO box detection for persons and faces.
//!
//! Models output either `[1, 4 + nc, N]` or `[1, N, 4 + nc]` with `xywh`
//! boxes in letterboxed input space.

use std::path::Path;

use image::RgbImage;
use ndarray::{Array2, ArrayView2, s};

use super::session::OnnxSession;
use super::{Detection, PersonDetector};
use crate::error::Result;
use crate::preprocessing::{PreprocessResult, clip_coords, letterbox, scale_coords};
use crate::results::BBox;
use crate::utils::nms;

/// COCO class index of "person".
pub const PERSON_CLASS: usize = 0;

/// Number of COCO classes.
pub const COCO_CLASSES: usize = 80;

/// Default YOLO input size (height, width).
pub const DEFAULT_IMGSZ: (usize, usize) = (640, 640);

/// Which predictions survive decoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectFilter {
    /// Keep only this class; `None` keeps every class.
    pub class_id: Option<usize>,
    /// Number of classes the model was trained on, `0` to infer from the shape.
    pub num_classes: usize,
    /// Minimum confidence.
    pub confidence: f32,
    /// `IoU` threshold for NMS.
    pub iou: f32,
    /// Maximum detections kept after NMS.
    pub max_detections: usize,
}

impl DetectFilter {
    /// Decode a raw YOLO output into frame-space detections.
    #[must_use]
    pub fn decode(&self, output: &[f32], shape: &[usize], preprocess: &PreprocessResult) -> Vec<Detection> {
        let (num_classes, num_predictions, is_transposed) =
            parse_detect_shape(shape, self.num_classes);

        if output.is_empty() || num_predictions == 0 {
            return Vec::new();
        }

        let output_2d = if is_transposed {
            Array2::from_shape_vec((num_predictions, 4 + num_classes), output.to_vec())
                .unwrap_or_else(|_| Array2::zeros((0, 0)))
        } else {
            let arr = Array2::from_shape_vec((4 + num_classes, num_predictions), output.to_vec())
                .unwrap_or_else(|_| Array2::zeros((0, 0)));
            arr.t().to_owned()
        };

        if output_2d.is_empty() {
            return Vec::new();
        }

        self.extract_boxes(output_2d.view(), preprocess)
    }

    fn extract_boxes(&self, output: ArrayView2<f32>, preprocess: &PreprocessResult) -> Vec<Detection> {
        let mut candidates = Vec::new();

        for i in 0..output.nrows() {
            let class_scores = output.slice(s![i, 4..]);

            // Find best class (treat NaN as lowest to avoid panic)
            let (best_class, best_score) = class_scores
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Less))
                .map(|(idx, &score)| (idx, if score.is_nan() { 0.0 } else { score }))
                .unwrap_or((0, 0.0));

            if best_score < self.confidence {
                continue;
            }
            if self.class_id.is_some_and(|c| c != best_class) {
                continue;
            }

            let (cx, cy, w, h) = (output[[i, 0]], output[[i, 1]], output[[i, 2]], output[[i, 3]]);
            let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];

            let scaled = scale_coords(&xyxy, preprocess.scale, preprocess.padding);
            let clipped = clip_coords(&scaled, preprocess.orig_shape);

            candidates.push((clipped, best_score));
        }

        nms(&candidates, self.iou)
            .into_iter()
            .take(self.max_detections)
            .map(|i| {
                let (xyxy, score) = candidates[i];
                Detection::new(BBox::from_xyxy(xyxy), score)
            })
            .collect()
    }
}

/// Parse detection output shape to determine format.
///
/// Derives the class count from the shape when `expected_classes` is `0`.
/// Returns `(num_classes, num_predictions, transposed)`.
fn parse_detect_shape(shape: &[usize], expected_classes: usize) -> (usize, usize, bool) {
    let (a, b) = match shape.len() {
        2 => (shape[0], shape[1]),
        3 => (shape[1], shape[2]),
        _ => return (expected_classes.max(1), 0, false),
    };

    if (a < 4 && b < 4) || a == 0 || b == 0 {
        return (expected_classes.max(1), 0, false);
    }

    if expected_classes == 0 {
        // Typically num_features < num_preds (e.g., 84 < 8400)
        let (num_features, num_preds, transposed) = if a < b { (a, b, false) } else { (b, a, true) };
        return (num_features.saturating_sub(4).max(1), num_preds, transposed);
    }

    if a == 4 + expected_classes {
        (expected_classes, b, false)
    } else if b == 4 + expected_classes {
        (expected_classes, a, true)
    } else if a < b {
        (a.saturating_sub(4).max(1), b, false)
    } else {
        (b.saturating_sub(4).max(1), a, true)
    }
}

/// YOLO detector over an ONNX session.
#[derive(Debug)]
pub struct YoloDetector {
    session: OnnxSession,
    imgsz: (usize, usize),
    filter: DetectFilter,
}

impl YoloDetector {
    /// Load a COCO model that reports persons only.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        Ok(Self {
            session: OnnxSession::load(path, num_threads)?,
            imgsz: DEFAULT_IMGSZ,
            filter: DetectFilter {
                class_id: Some(PERSON_CLASS),
                num_classes: COCO_CLASSES,
                confidence: 0.5,
                iou: 0.45,
                max_detections: 300,
            },
        })
    }

    /// Load a single-class model such as a face detector.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load_single_class<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        let mut detector = Self::load(path, num_threads)?;
        detector.filter.class_id = None;
        detector.filter.num_classes = 1;
        Ok(detector)
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.filter.confidence = confidence;
        self
    }

    /// Set the NMS `IoU` threshold.
    #[must_use]
    pub const fn with_iou(mut self, iou: f32) -> Self {
        self.filter.iou = iou;
        self
    }

    /// Set the input size (height, width).
    #[must_use]
    pub const fn with_imgsz(mut self, imgsz: (usize, usize)) -> Self {
        self.imgsz = imgsz;
        self
    }

    /// Run detection on a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let preprocess = letterbox(frame, self.imgsz)?;
        let outputs = self.session.run(&preprocess.tensor)?;
        Ok(outputs
            .first()
            .map(|(data, shape)| self.filter.decode(data, shape, &preprocess))
            .unwrap_or_default())
    }
}

impl PersonDetector for YoloDetector {
    fn detect_persons(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        self.detect(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn identity_preprocess(h: u32, w: u32) -> PreprocessResult {
        PreprocessResult {
            tensor: Array4::zeros((1, 3, 1, 1)),
            orig_shape: (h, w),
            scale: (1.0, 1.0),
            padding: (0.0, 0.0),
        }
    }

    fn filter(class_id: Option<usize>, num_classes: usize) -> DetectFilter {
        DetectFilter {
            class_id,
            num_classes,
            confidence: 0.5,
            iou: 0.45,
            max_detections: 300,
        }
    }

    #[test]
    fn test_parse_detect_shape() {
        assert_eq!(parse_detect_shape(&[1, 84, 8400], 80), (80, 8400, false));
        assert_eq!(parse_detect_shape(&[1, 8400, 84], 80), (80, 8400, true));
        assert_eq!(parse_detect_shape(&[1, 5, 8400], 1), (1, 8400, false));
        assert_eq!(parse_detect_shape(&[1, 5, 8400], 0), (1, 8400, false));
        assert_eq!(parse_detect_shape(&[1, 84, 0], 80).1, 0);
        assert_eq!(parse_detect_shape(&[84], 80).1, 0);
    }

    #[test]
    fn test_decode_keeps_persons_only() {
        // Features-first layout, 2 classes, 3 predictions
        #[rustfmt::skip]
        let output = vec![
            // cx
            50.0, 50.0, 150.0,
            // cy
            50.0, 50.0, 50.0,
            // w
            20.0, 20.0, 20.0,
            // h
            40.0, 40.0, 40.0,
            // class 0 (person)
            0.9, 0.1, 0.3,
            // class 1
            0.0, 0.8, 0.2,
        ];
        let dets = filter(Some(0), 2).decode(&output, &[1, 6, 3], &identity_preprocess(200, 200));

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BBox::new(40, 30, 60, 70));
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_applies_nms_and_clipping() {
        // Predictions-first layout, single class
        #[rustfmt::skip]
        let output = vec![
            10.0, 10.0, 40.0, 40.0, 0.7,
            12.0, 12.0, 40.0, 40.0, 0.95,
            90.0, 90.0, 10.0, 10.0, 0.6,
        ];
        let dets = filter(None, 1).decode(&output, &[1, 3, 5], &identity_preprocess(100, 100));

        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.95).abs() < 1e-6);
        assert_eq!(dets[0].bbox.x1, 0);
        assert_eq!(dets[1].bbox, BBox::new(85, 85, 95, 95));
    }

    #[test]
    fn test_decode_empty_and_nan() {
        let f = filter(None, 1);
        assert!(f.decode(&[], &[1, 5, 0], &identity_preprocess(10, 10)).is_empty());
        let output = vec![5.0, 5.0, 2.0, 2.0, f32::NAN];
        assert!(f.decode(&output, &[1, 1, 5], &identity_preprocess(10, 10)).is_empty());
    }
}
