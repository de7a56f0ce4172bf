// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame masking pipeline.
//!
//! A frame goes through: person detection, pose estimation per person crop,
//! landmark derivation, skin masking, exposure classification, identity
//! reconciliation, region aggregation for the matched person and finally
//! blurring of the flagged regions. Frames are independent: nothing is
//! carried from one frame to the next.

use image::RgbImage;

#[cfg(feature = "annotate")]
use crate::annotate::Annotator;
use crate::config::MaskingConfig;
use crate::error::Result;
use crate::exposure::ExposureClassifier;
use crate::identity::{find_person_for_faces, match_gallery};
use crate::landmarks::LandmarkSet;
use crate::masking::MaskApplier;
use crate::preprocessing::crop_box;
use crate::regions::RegionAggregator;
use crate::results::{BBox, Diagnostics, FaceRecord, FrameOutcome, PersonRecord, PersonReport, Verdict};
use crate::skin::build_skin_mask;
use crate::source::{Source, SourceIterator, SourceMeta};

pub use crate::models::Capabilities;

/// Runs the masking stages over frames with injected model capabilities.
#[derive(Debug)]
pub struct MaskingPipeline {
    caps: Capabilities,
    config: MaskingConfig,
    classifier: ExposureClassifier,
    aggregator: RegionAggregator,
    applier: MaskApplier,
    #[cfg(feature = "annotate")]
    annotator: Option<Annotator>,
}

impl MaskingPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(caps: Capabilities, config: MaskingConfig) -> Self {
        Self {
            classifier: ExposureClassifier::from_config(&config),
            aggregator: RegionAggregator::from_config(&config),
            applier: MaskApplier::from_config(&config),
            caps,
            config,
            #[cfg(feature = "annotate")]
            annotator: None,
        }
    }

    /// Use this annotator for diagnostics instead of loading the default font.
    #[cfg(feature = "annotate")]
    #[must_use]
    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MaskingConfig {
        &self.config
    }

    /// Detect persons and estimate their landmarks.
    ///
    /// Persons whose crop is empty or whose pose is not found are dropped;
    /// indices count only the persons kept.
    ///
    /// # Errors
    ///
    /// Returns an error if detection or pose inference fails.
    pub fn detect_persons(&mut self, frame: &RgbImage) -> Result<Vec<PersonRecord>> {
        let detections = self.caps.detector.detect_persons(frame)?;
        let mut persons = Vec::new();

        for det in detections {
            if det.confidence < self.config.person_confidence {
                continue;
            }
            let bbox = det.bbox.clamp_to(frame.width(), frame.height());
            let Some(crop) = crop_box(frame, bbox) else {
                crate::verbose!("Skipping empty person box {:?}", det.bbox);
                continue;
            };
            let Some(points) = self.caps.pose.estimate(&crop)? else {
                crate::verbose!("No pose for person box {:?}", bbox);
                continue;
            };

            let landmarks = LandmarkSet::derived_from_pose(&points, (bbox.x1, bbox.y1));
            persons.push(PersonRecord::new(persons.len(), bbox, landmarks));
        }

        crate::verbose!("{} person(s) with pose", persons.len());
        Ok(persons)
    }

    /// Face boxes used to pick the target person.
    ///
    /// With a reference, only the best gallery match counts. Without one,
    /// every detected face does.
    fn target_faces(&self, faces: &[FaceRecord], reference: &[FaceRecord]) -> Vec<BBox> {
        if reference.is_empty() {
            return faces.iter().map(|f| f.bbox).collect();
        }

        let policy = self
            .config
            .similarity
            .policy(self.config.effective_match_threshold());
        match match_gallery(reference, faces, policy.as_ref()) {
            Some(m) => {
                crate::verbose!("Reference matched face {} (score {:.3})", m.index, m.score);
                vec![m.bbox]
            }
            None => {
                crate::verbose!("Reference matched none of {} face(s)", faces.len());
                Vec::new()
            }
        }
    }

    /// Process a single frame.
    ///
    /// # Arguments
    ///
    /// * `frame` - RGB frame.
    /// * `reference` - Reference face(s); only the first is compared. Empty
    ///   means any detected face selects its person.
    ///
    /// # Errors
    ///
    /// Returns an error if any model call fails.
    pub fn process_image(&mut self, frame: &RgbImage, reference: &[FaceRecord]) -> Result<FrameOutcome> {
        let persons = self.detect_persons(frame)?;

        let labels = self.caps.segmenter.segment(frame)?;
        let skin = build_skin_mask(frame, &labels)?;

        let report: Vec<PersonReport> = persons
            .iter()
            .map(|p| PersonReport {
                person: p.index,
                bbox: p.bbox,
                landmarks: self.classifier.classify(&p.landmarks, &skin),
            })
            .collect();

        let faces = self.caps.faces.analyze(frame)?;
        let face_boxes = self.target_faces(&faces, reference);
        let target = find_person_for_faces(&face_boxes, &persons);

        let mut image = frame.clone();
        let mut clusters = None;
        let mut exposed = Vec::new();

        if let Some(idx) = target {
            let entries = &report[idx].landmarks;
            let (upper, lower) = self.aggregator.aggregate(entries, frame.width(), frame.height());
            for cluster in [&upper, &lower] {
                if cluster.needs_masking() {
                    let applied = self.applier.apply(&mut image, cluster.bbox);
                    crate::verbose!(
                        "Person {idx} {} cluster {:?}: {}",
                        cluster.kind.as_str(),
                        cluster.bbox,
                        if applied { "masked" } else { "degenerate, skipped" }
                    );
                }
            }
            exposed = report[idx].exposed_names();
            clusters = Some((upper, lower));
        } else {
            crate::verbose!("No person owns the selected face(s)");
        }

        let verdict = Verdict::new(target.is_some(), exposed, target.is_some());
        let diagnostics = self.diagnostics(frame, &report, target, &face_boxes, &faces);
        // Without a target the output is the frame annotated with detections
        if target.is_none()
            && let Some(d) = &diagnostics
        {
            image.clone_from(&d.boxes);
        }

        Ok(FrameOutcome {
            report,
            target,
            clusters,
            image,
            diagnostics,
            verdict,
        })
    }

    #[cfg(feature = "annotate")]
    fn diagnostics(
        &mut self,
        frame: &RgbImage,
        report: &[PersonReport],
        target: Option<usize>,
        face_boxes: &[BBox],
        faces: &[FaceRecord],
    ) -> Option<Diagnostics> {
        if !self.config.diagnostics {
            return None;
        }
        let annotator = self.annotator.get_or_insert_with(Annotator::new);

        let shown_persons = match target.and_then(|i| report.get(i)) {
            Some(t) => std::slice::from_ref(t),
            None => report,
        };
        let shown_faces: Vec<BBox> = if face_boxes.is_empty() {
            faces.iter().map(|f| f.bbox).collect()
        } else {
            face_boxes.to_vec()
        };

        Some(Diagnostics {
            exposure: annotator.draw_exposure(frame, report, self.config.exposure_radius),
            boxes: annotator.draw_boxes(frame, &shown_faces, shown_persons),
        })
    }

    #[cfg(not(feature = "annotate"))]
    #[allow(clippy::unused_self, clippy::needless_pass_by_ref_mut)]
    fn diagnostics(
        &mut self,
        _frame: &RgbImage,
        _report: &[PersonReport],
        _target: Option<usize>,
        _face_boxes: &[BBox],
        _faces: &[FaceRecord],
    ) -> Option<Diagnostics> {
        None
    }

    /// Process every frame of a source, handing each outcome to `sink`.
    ///
    /// Stops at the first error, from the source, the pipeline or the sink.
    ///
    /// # Returns
    ///
    /// Number of frames processed.
    ///
    /// # Errors
    ///
    /// Returns the first error met.
    pub fn process_source<F>(&mut self, source: Source, reference: &[FaceRecord], mut sink: F) -> Result<usize>
    where
        F: FnMut(&SourceMeta, &FrameOutcome) -> Result<()>,
    {
        let mut count = 0;
        for item in SourceIterator::new(source)? {
            let (img, meta) = item?;
            let frame = img.to_rgb8();
            let outcome = self.process_image(&frame, reference)?;
            crate::verbose!("frame {}: {}", meta.frame_idx, outcome.summary());
            sink(&meta, &outcome)?;
            count += 1;
        }
        Ok(count)
    }

    /// Mask every frame of a video and re-encode it at the source frame rate
    /// and resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding, processing or encoding fails. The output
    /// file is removed in that case.
    #[cfg(feature = "video")]
    pub fn process_video<P, Q>(&mut self, input: P, output: Q, reference: &[FaceRecord]) -> Result<usize>
    where
        P: AsRef<std::path::Path>,
        Q: AsRef<std::path::Path>,
    {
        use crate::error::MaskingError;
        use crate::io::VideoWriter;

        let output = output.as_ref();
        let mut writer: Option<VideoWriter> = None;
        let result = self.process_source(
            Source::Video(input.as_ref().to_path_buf()),
            reference,
            |meta, outcome| {
                if writer.is_none() {
                    writer = Some(VideoWriter::new(
                        output,
                        outcome.image.width() as usize,
                        outcome.image.height() as usize,
                        meta.fps.unwrap_or(30.0),
                    )?);
                }
                match writer.as_mut() {
                    Some(w) => w.write_frame(&outcome.image),
                    None => Ok(()),
                }
            },
        );

        match (result, writer) {
            (Ok(0), _) => Err(MaskingError::InputUnavailable(format!(
                "No frames decoded from {}",
                input.as_ref().display()
            ))),
            (Ok(count), Some(w)) => {
                let path = w.path().to_path_buf();
                if let Err(e) = w.finish() {
                    let _ = std::fs::remove_file(&path);
                    return Err(e);
                }
                Ok(count)
            }
            (Ok(count), None) => Ok(count),
            (Err(e), w) => {
                if let Some(w) = w {
                    w.abort();
                } else if output.exists() {
                    let _ = std::fs::remove_file(output);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::PosePoint;
    use crate::models::{Detection, FaceAnalyzer, PersonDetector, PersonSegmenter, PoseEstimator};
    use crate::skin::LabelMap;
    use image::Rgb;

    struct Persons(Vec<Detection>);
    impl PersonDetector for Persons {
        fn detect_persons(&mut self, _: &RgbImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct NoPose;
    impl PoseEstimator for NoPose {
        fn estimate(&mut self, _: &RgbImage) -> Result<Option<Vec<PosePoint>>> {
            Ok(None)
        }
    }

    struct Background;
    impl PersonSegmenter for Background {
        fn segment(&mut self, frame: &RgbImage) -> Result<LabelMap> {
            Ok(LabelMap::new(frame.width(), frame.height()))
        }
    }

    struct NoFaces;
    impl FaceAnalyzer for NoFaces {
        fn analyze(&mut self, _: &RgbImage) -> Result<Vec<FaceRecord>> {
            Ok(Vec::new())
        }
    }

    fn pipeline(detections: Vec<Detection>) -> MaskingPipeline {
        let caps = Capabilities {
            detector: Box::new(Persons(detections)),
            pose: Box::new(NoPose),
            segmenter: Box::new(Background),
            faces: Box::new(NoFaces),
        };
        MaskingPipeline::new(caps, MaskingConfig::default().with_diagnostics(false))
    }

    #[test]
    fn test_empty_frame_is_not_same_person() {
        let frame = RgbImage::from_pixel(32, 32, Rgb([5, 5, 5]));
        let outcome = pipeline(Vec::new()).process_image(&frame, &[]).unwrap();

        assert!(outcome.report.is_empty());
        assert_eq!(outcome.target, None);
        assert_eq!(outcome.image, frame);
        assert_eq!(outcome.verdict.identity_message(), "Not the same person.");
        assert_eq!(outcome.verdict.masking_message(), "Masking skipped.");
        assert!(outcome.diagnostics.is_none());
    }

    #[test]
    fn test_persons_without_pose_are_dropped() {
        let dets = vec![
            Detection::new(BBox::new(0, 0, 10, 10), 0.9),
            Detection::new(BBox::new(5, 5, 5, 20), 0.9),
        ];
        let frame = RgbImage::new(32, 32);
        let persons = pipeline(dets).detect_persons(&frame).unwrap();
        assert!(persons.is_empty());
    }

    #[test]
    fn test_process_source_counts_frames() {
        let frame = image::DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let mut seen = Vec::new();
        let count = pipeline(Vec::new())
            .process_source(Source::from(frame), &[], |meta, outcome| {
                seen.push((meta.frame_idx, outcome.target));
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(seen, vec![(0, None)]);
    }

    #[test]
    fn test_sink_error_aborts() {
        let frame = image::DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let result = pipeline(Vec::new()).process_source(Source::from(frame), &[], |_, _| {
            Err(crate::error::MaskingError::VideoError("encoder closed".to_string()))
        });
        assert!(result.is_err());
    }

    #[cfg(feature = "video")]
    #[test]
    fn test_undecodable_video_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"not a video container").unwrap();
        let output = dir.path().join("out").join("clip.mp4");

        let result = pipeline(Vec::new()).process_video(&input, &output, &[]);
        assert!(matches!(
            result,
            Err(crate::error::MaskingError::InputUnavailable(_))
        ));
        assert!(!output.exists());

        let missing = dir.path().join("missing.mp4");
        let result = pipeline(Vec::new()).process_video(&missing, &output, &[]);
        assert!(matches!(
            result,
            Err(crate::error::MaskingError::InputUnavailable(_))
        ));
        assert!(!output.exists());
    }
}
