// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end pipeline tests with in-process model doubles.

use exposure_mask::models::{Detection, FaceAnalyzer, PersonDetector, PersonSegmenter, PoseEstimator};
use exposure_mask::regions::ClusterKind;
use exposure_mask::skin::LabelMap;
use exposure_mask::{
    BBox, Capabilities, FaceRecord, MaskingConfig, MaskingPipeline, PosePoint, Result,
    SimilarityMetric,
};
use image::{Luma, Rgb, RgbImage};

const WIDTH: u32 = 400;
const HEIGHT: u32 = 600;
const BACKGROUND: Rgb<u8> = Rgb([30, 60, 200]);
const SKIN_TONE: Rgb<u8> = Rgb([220, 170, 140]);

struct FixedPersons(Vec<Detection>);

impl PersonDetector for FixedPersons {
    fn detect_persons(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.0.clone())
    }
}

struct FixedPose(Vec<PosePoint>);

impl PoseEstimator for FixedPose {
    fn estimate(&mut self, _crop: &RgbImage) -> Result<Option<Vec<PosePoint>>> {
        Ok(Some(self.0.clone()))
    }
}

struct AllForeground;

impl PersonSegmenter for AllForeground {
    fn segment(&mut self, frame: &RgbImage) -> Result<LabelMap> {
        Ok(LabelMap::from_pixel(frame.width(), frame.height(), Luma([1])))
    }
}

struct FixedFaces(Vec<FaceRecord>);

impl FaceAnalyzer for FixedFaces {
    fn analyze(&mut self, _frame: &RgbImage) -> Result<Vec<FaceRecord>> {
        Ok(self.0.clone())
    }
}

/// Blue frame with one skin-colored disk over the left nipple position.
fn frame() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let (dx, dy) = (i64::from(x) - 220, i64::from(y) - 200);
        if dx * dx + dy * dy <= 400 {
            SKIN_TONE
        } else {
            BACKGROUND
        }
    })
}

fn pose() -> Vec<PosePoint> {
    vec![
        PosePoint::new(9, 205, 100),
        PosePoint::new(10, 195, 100),
        PosePoint::new(11, 240, 150),
        PosePoint::new(12, 160, 150),
        PosePoint::new(15, 380, 580),
        PosePoint::new(16, 20, 580),
        PosePoint::new(23, 230, 350),
        PosePoint::new(24, 170, 350),
        PosePoint::new(25, 230, 480),
        PosePoint::new(26, 170, 480),
    ]
}

fn face() -> FaceRecord {
    FaceRecord::new(BBox::new(180, 60, 220, 120), vec![1.0, 0.0, 0.0])
}

fn pipeline(faces: Vec<FaceRecord>, config: MaskingConfig) -> MaskingPipeline {
    let caps = Capabilities {
        detector: Box::new(FixedPersons(vec![Detection::new(
            BBox::new(0, 0, 400, 600),
            0.9,
        )])),
        pose: Box::new(FixedPose(pose())),
        segmenter: Box::new(AllForeground),
        faces: Box::new(FixedFaces(faces)),
    };
    MaskingPipeline::new(caps, config)
}

fn config() -> MaskingConfig {
    MaskingConfig::new().with_blur(51, 3).with_diagnostics(false)
}

#[test]
fn test_only_left_nipple_exposed_masks_upper_region() {
    let input = frame();
    let reference = vec![FaceRecord::new(BBox::default(), vec![1.0, 0.0, 0.0])];
    let outcome = pipeline(vec![face()], config())
        .process_image(&input, &reference)
        .unwrap();

    assert_eq!(outcome.report.len(), 1);
    assert_eq!(outcome.target, Some(0));
    let target = outcome.target_report().unwrap();
    assert_eq!(target.exposed_names(), vec!["Left Nipple".to_string()]);

    let (upper, lower) = outcome.clusters.unwrap();
    assert_eq!(upper.kind, ClusterKind::Upper);
    assert!(upper.exposed);
    assert!(!lower.exposed);
    assert!(!lower.needs_masking());
    assert_eq!(upper.bbox.x1, 128);
    assert_eq!(upper.bbox.y1, 120);
    assert_eq!(upper.bbox.y2, 330);
    assert!((271..=272).contains(&upper.bbox.x2));

    // Blurred inside the upper rectangle, untouched everywhere else
    assert_ne!(*outcome.image.get_pixel(220, 200), SKIN_TONE);
    for (x, y, px) in input.enumerate_pixels() {
        #[allow(clippy::cast_possible_wrap)]
        let (xi, yi) = (x as i32, y as i32);
        let inside = xi >= upper.bbox.x1 && xi < upper.bbox.x2 && yi >= upper.bbox.y1 && yi < upper.bbox.y2;
        if !inside {
            assert_eq!(outcome.image.get_pixel(x, y), px, "pixel ({x}, {y}) changed");
        }
    }

    assert_eq!(
        outcome.verdict.messages(),
        [
            "Same person.".to_string(),
            "Exposed. Exposed parts: Left Nipple".to_string(),
            "Masking applied.".to_string(),
        ]
    );
}

#[test]
fn test_report_lists_allow_listed_landmarks_in_order() {
    let outcome = pipeline(vec![face()], config())
        .process_image(&frame(), &[])
        .unwrap();

    let ids: Vec<u32> = outcome.report[0].landmarks.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![38, 39, 36, 23, 24, 40, 43, 44, 45, 46, 47, 48, 49]);
    assert_eq!(outcome.report[0].bbox, BBox::new(0, 0, 400, 600));
}

#[test]
fn test_unmatched_reference_skips_masking() {
    let input = frame();
    let reference = vec![FaceRecord::new(BBox::default(), vec![0.0, 1.0, 0.0])];
    let outcome = pipeline(vec![face()], config())
        .process_image(&input, &reference)
        .unwrap();

    assert_eq!(outcome.target, None);
    assert!(outcome.clusters.is_none());
    assert_eq!(outcome.image, input);
    // The report still covers every person
    assert_eq!(outcome.report.len(), 1);
    assert_eq!(
        outcome.verdict.messages(),
        [
            "Not the same person.".to_string(),
            "Not exposed.".to_string(),
            "Masking skipped.".to_string(),
        ]
    );
}

#[test]
fn test_euclidean_metric_matches_close_embeddings() {
    let reference = vec![FaceRecord::new(BBox::default(), vec![0.9, 0.1, 0.0])];
    let config = config().with_similarity(SimilarityMetric::Euclidean);
    let outcome = pipeline(vec![face()], config)
        .process_image(&frame(), &reference)
        .unwrap();
    assert_eq!(outcome.target, Some(0));
}

#[test]
fn test_face_outside_person_is_not_same_person() {
    let stray = FaceRecord::new(BBox::new(380, 590, 410, 620), vec![1.0, 0.0, 0.0]);
    let input = frame();
    let outcome = pipeline(vec![stray], config())
        .process_image(&input, &[])
        .unwrap();
    assert_eq!(outcome.target, None);
    assert_eq!(outcome.image, input);
}

#[test]
fn test_no_faces_is_not_same_person() {
    let outcome = pipeline(Vec::new(), config())
        .process_image(&frame(), &[face()])
        .unwrap();
    assert!(!outcome.verdict.same_person);
}

#[test]
fn test_low_confidence_person_is_ignored() {
    let caps = Capabilities {
        detector: Box::new(FixedPersons(vec![Detection::new(
            BBox::new(0, 0, 400, 600),
            0.3,
        )])),
        pose: Box::new(FixedPose(pose())),
        segmenter: Box::new(AllForeground),
        faces: Box::new(FixedFaces(vec![face()])),
    };
    let outcome = MaskingPipeline::new(caps, config())
        .process_image(&frame(), &[])
        .unwrap();
    assert!(outcome.report.is_empty());
    assert_eq!(outcome.target, None);
}

#[cfg(feature = "annotate")]
#[test]
fn test_diagnostics_are_rendered() {
    use exposure_mask::annotate::{Annotator, EXPOSED_COLOR, FACE_COLOR};

    let input = frame();
    let outcome = pipeline(vec![face()], config().with_diagnostics(true))
        .with_annotator(Annotator::without_font())
        .process_image(&input, &[])
        .unwrap();

    let diagnostics = outcome.diagnostics.unwrap();
    // Right edge of the exposure circle around the left nipple
    assert_eq!(*diagnostics.exposure.get_pixel(240, 200), EXPOSED_COLOR);
    assert_eq!(*diagnostics.boxes.get_pixel(200, 60), FACE_COLOR);
    // Diagnostics are drawn on the unmasked frame
    assert_eq!(*diagnostics.boxes.get_pixel(220, 215), SKIN_TONE);
}

#[cfg(feature = "annotate")]
#[test]
fn test_unmatched_output_is_box_annotated() {
    use exposure_mask::annotate::{Annotator, FACE_COLOR, PERSON_COLOR};

    let input = frame();
    let reference = vec![FaceRecord::new(BBox::default(), vec![0.0, 1.0, 0.0])];
    let outcome = pipeline(vec![face()], config().with_diagnostics(true))
        .with_annotator(Annotator::without_font())
        .process_image(&input, &reference)
        .unwrap();

    assert_eq!(outcome.target, None);
    let diagnostics = outcome.diagnostics.unwrap();
    assert_eq!(outcome.image, diagnostics.boxes);
    assert_eq!(*outcome.image.get_pixel(0, 300), PERSON_COLOR);
    assert_eq!(*outcome.image.get_pixel(200, 60), FACE_COLOR);
    // Not blurred
    assert_eq!(*outcome.image.get_pixel(220, 215), SKIN_TONE);
}

#[test]
fn test_frames_are_independent() {
    let input = frame();
    let mut pipeline = pipeline(vec![face()], config());
    let first = pipeline.process_image(&input, &[]).unwrap();
    let second = pipeline.process_image(&input, &[]).unwrap();
    assert_eq!(first.image, second.image);
    assert_eq!(first.report, second.report);
}
