// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame records and the structured exposure report.
//!
//! Everything here is created fresh for each processed frame and owned by the
//! pipeline call that produced it.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::exposure::{Exposure, ExposureEntry};
use crate::landmarks::LandmarkSet;
use crate::regions::RegionCluster;

/// Axis-aligned box in integer pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
}

impl BBox {
    /// Create a new box.
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from float `xyxy` coordinates, truncating toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_xyxy(xyxy: [f32; 4]) -> Self {
        Self::new(
            xyxy[0] as i32,
            xyxy[1] as i32,
            xyxy[2] as i32,
            xyxy[3] as i32,
        )
    }

    /// Box width (may be negative for malformed boxes).
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    /// Box height (may be negative for malformed boxes).
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Area in pixels, `0` for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> i64 {
        i64::from(self.width().max(0)) * i64::from(self.height().max(0))
    }

    /// Whether `inner` lies entirely within this box, edges inclusive.
    #[must_use]
    pub const fn contains(&self, inner: &Self) -> bool {
        inner.x1 >= self.x1 && inner.y1 >= self.y1 && inner.x2 <= self.x2 && inner.y2 <= self.y2
    }

    /// Clamp to a `width` x `height` frame.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        Self::new(
            self.x1.clamp(0, w),
            self.y1.clamp(0, h),
            self.x2.clamp(0, w),
            self.y2.clamp(0, h),
        )
    }
}

impl From<[i32; 4]> for BBox {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A face produced by the face model: a box and its identity embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    /// Owning identity, when the record comes from a registration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<usize>,
    /// Face box in frame coordinates.
    pub bbox: BBox,
    /// Unit-normalized embedding; may be empty if extraction failed.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl FaceRecord {
    /// Create a face record without an identity.
    #[must_use]
    pub const fn new(bbox: BBox, embedding: Vec<f32>) -> Self {
        Self {
            person: None,
            bbox,
            embedding,
        }
    }
}

/// One detected person for whom pose estimation succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    /// Index among the persons of this frame.
    pub index: usize,
    /// Body box in frame coordinates.
    pub bbox: BBox,
    /// Primary and derived landmarks.
    pub landmarks: LandmarkSet,
}

impl PersonRecord {
    /// Create a person record.
    #[must_use]
    pub const fn new(index: usize, bbox: BBox, landmarks: LandmarkSet) -> Self {
        Self {
            index,
            bbox,
            landmarks,
        }
    }
}

/// Report entry for one person: box and classified allow-listed landmarks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonReport {
    /// Person index within the frame.
    pub person: usize,
    /// Body box.
    pub bbox: BBox,
    /// Classified landmarks, in allow-list order.
    pub landmarks: Vec<ExposureEntry>,
}

impl PersonReport {
    /// Names of the landmarks classified as exposed.
    #[must_use]
    pub fn exposed_names(&self) -> Vec<String> {
        self.landmarks
            .iter()
            .filter(|e| e.exposure == Exposure::Exposed)
            .map(|e| e.name.clone())
            .collect()
    }
}

/// Human-readable verdicts for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Whether a body was matched to the reference face.
    pub same_person: bool,
    /// Sorted, de-duplicated names of the target's exposed landmarks.
    pub exposed_parts: Vec<String>,
    /// Whether the masking stage ran for the target.
    pub masking_applied: bool,
}

impl Verdict {
    /// Build a verdict, sorting and de-duplicating the exposed names.
    #[must_use]
    pub fn new(same_person: bool, mut exposed_parts: Vec<String>, masking_applied: bool) -> Self {
        exposed_parts.sort();
        exposed_parts.dedup();
        Self {
            same_person,
            exposed_parts,
            masking_applied,
        }
    }

    /// Same-person message.
    #[must_use]
    pub fn identity_message(&self) -> &'static str {
        if self.same_person {
            "Same person."
        } else {
            "Not the same person."
        }
    }

    /// Exposed-parts summary.
    #[must_use]
    pub fn exposure_message(&self) -> String {
        if self.exposed_parts.is_empty() {
            "Not exposed.".to_string()
        } else {
            format!("Exposed. Exposed parts: {}", self.exposed_parts.join(", "))
        }
    }

    /// Masking message.
    #[must_use]
    pub fn masking_message(&self) -> &'static str {
        if self.masking_applied {
            "Masking applied."
        } else {
            "Masking skipped."
        }
    }

    /// All three messages, in pipeline order.
    #[must_use]
    pub fn messages(&self) -> [String; 3] {
        [
            self.identity_message().to_string(),
            self.exposure_message(),
            self.masking_message().to_string(),
        ]
    }
}

/// Diagnostic renderings of a frame.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Frame with exposure circles and labels for every reported landmark.
    pub exposure: RgbImage,
    /// Frame with face boxes, person boxes and landmark markers.
    pub boxes: RgbImage,
}

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// Structured report for every person with a pose.
    pub report: Vec<PersonReport>,
    /// Index (into `report`) of the person matched to the face, if any.
    pub target: Option<usize>,
    /// Upper and lower clusters of the target person.
    pub clusters: Option<(RegionCluster, RegionCluster)>,
    /// Output frame: masked when a target was found, otherwise the input,
    /// annotated with the detection boxes when diagnostics are on.
    pub image: RgbImage,
    /// Diagnostic renderings, when enabled.
    pub diagnostics: Option<Diagnostics>,
    /// Human-readable verdicts.
    pub verdict: Verdict,
}

impl FrameOutcome {
    /// Report of the target person, if one was matched.
    #[must_use]
    pub fn target_report(&self) -> Option<&PersonReport> {
        self.target.and_then(|i| self.report.get(i))
    }

    /// Short summary like "2 persons, target 0, upper masked".
    #[must_use]
    pub fn summary(&self) -> String {
        let persons = match self.report.len() {
            0 => "no persons".to_string(),
            1 => "1 person".to_string(),
            n => format!("{n} persons"),
        };
        let Some(target) = self.target_report() else {
            return format!("{persons}, no target");
        };
        let mut masked = Vec::new();
        if let Some((upper, lower)) = &self.clusters {
            if upper.exposed {
                masked.push("upper");
            }
            if lower.exposed {
                masked.push("lower");
            }
        }
        if masked.is_empty() {
            format!("{persons}, target {}, nothing masked", target.person)
        } else {
            format!(
                "{persons}, target {}, {} masked",
                target.person,
                masked.join("+")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_serializes_as_array() {
        let json = serde_json::to_string(&BBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
        let back: BBox = serde_json::from_str("[5,6,7,8]").unwrap();
        assert_eq!(back, BBox::new(5, 6, 7, 8));
    }

    #[test]
    fn test_bbox_from_float_truncates() {
        assert_eq!(
            BBox::from_xyxy([10.9, 20.2, 30.5, 40.99]),
            BBox::new(10, 20, 30, 40)
        );
    }

    #[test]
    fn test_bbox_area_and_clamp() {
        assert_eq!(BBox::new(0, 0, 10, 5).area(), 50);
        assert_eq!(BBox::new(10, 0, 0, 5).area(), 0);
        assert_eq!(
            BBox::new(-5, -5, 700, 500).clamp_to(640, 480),
            BBox::new(0, 0, 640, 480)
        );
    }

    #[test]
    fn test_face_record_json() {
        let faces: Vec<FaceRecord> =
            serde_json::from_str(r#"[{"bbox": [1, 2, 3, 4], "embedding": [0.5, 0.5]}]"#).unwrap();
        assert_eq!(faces[0].person, None);
        assert_eq!(faces[0].bbox, BBox::new(1, 2, 3, 4));

        let json = serde_json::to_string(&faces[0]).unwrap();
        assert!(!json.contains("person"));
    }

    #[test]
    fn test_verdict_messages() {
        let verdict = Verdict::new(
            true,
            vec![
                "Right Nipple".to_string(),
                "Left Nipple".to_string(),
                "Left Nipple".to_string(),
            ],
            true,
        );
        assert_eq!(
            verdict.messages(),
            [
                "Same person.".to_string(),
                "Exposed. Exposed parts: Left Nipple, Right Nipple".to_string(),
                "Masking applied.".to_string(),
            ]
        );

        let none = Verdict::default();
        assert_eq!(none.identity_message(), "Not the same person.");
        assert_eq!(none.exposure_message(), "Not exposed.");
        assert_eq!(none.masking_message(), "Masking skipped.");
    }
}
