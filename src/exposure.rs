// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-landmark exposure classification.
//!
//! A landmark is exposed when at least `threshold` of the skin mask inside a
//! disk of radius `radius` around it is skin. Landmarks close to a wrist are
//! always covered: hands register as skin and would otherwise drag nearby
//! body points into masking.

use serde::{Deserialize, Serialize};

use crate::config::MaskingConfig;
use crate::landmarks::{LandmarkSet, ids};
use crate::skin::SkinMask;

/// Landmarks that are classified and reported, in report order.
pub const IMPORTANT_IDS: [u32; 13] = [
    ids::LEFT_NIPPLE,
    ids::RIGHT_NIPPLE,
    ids::GENITAL,
    ids::LEFT_HIP,
    ids::RIGHT_HIP,
    ids::CHEST_CENTER,
    ids::LEFT_UPPER_THIGH_2,
    ids::RIGHT_UPPER_THIGH_2,
    ids::UNDERBUST_CENTER,
    ids::LEFT_UNDERBUST,
    ids::RIGHT_UNDERBUST,
    ids::ABDOMEN_CENTER,
    ids::NECK,
];

/// Exposure state of a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Surrounded mostly by skin.
    Exposed,
    /// Not enough skin, out of frame, or next to a wrist.
    Covered,
}

impl Exposure {
    /// Lowercase label used in reports and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exposed => "exposed",
            Self::Covered => "covered",
        }
    }
}

impl From<bool> for Exposure {
    fn from(exposed: bool) -> Self {
        if exposed { Self::Exposed } else { Self::Covered }
    }
}

/// A classified landmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureEntry {
    /// Landmark ID.
    pub id: u32,
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Landmark name.
    pub name: String,
    /// Classification.
    pub exposure: Exposure,
}

/// Classifies landmarks against a skin mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureClassifier {
    radius: u32,
    threshold: f32,
    wrist_factor: f32,
}

impl Default for ExposureClassifier {
    fn default() -> Self {
        Self::from_config(&MaskingConfig::default())
    }
}

impl ExposureClassifier {
    /// Create a classifier.
    ///
    /// # Arguments
    ///
    /// * `radius` - Disk radius in pixels.
    /// * `threshold` - Minimum skin fraction for "exposed".
    /// * `wrist_factor` - Wrists closer than `wrist_factor * radius` force "covered".
    #[must_use]
    pub const fn new(radius: u32, threshold: f32, wrist_factor: f32) -> Self {
        Self {
            radius,
            threshold,
            wrist_factor,
        }
    }

    /// Create a classifier from the pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &MaskingConfig) -> Self {
        Self::new(
            config.exposure_radius,
            config.exposure_threshold,
            config.wrist_suppression_factor,
        )
    }

    /// Fraction of skin pixels in the disk around `(x, y)`, clipped to the mask.
    ///
    /// Returns `None` when the center lies outside the mask.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn skin_ratio(&self, x: i32, y: i32, mask: &SkinMask) -> Option<f64> {
        let (cx, cy) = (i64::from(x), i64::from(y));
        if cx < 0 || cy < 0 || cx >= i64::from(mask.width()) || cy >= i64::from(mask.height()) {
            return None;
        }

        let r = i64::from(self.radius);
        let (mut skin, mut total) = (0_u64, 0_u64);
        for dy in -r..=r {
            let py = cy + dy;
            if py < 0 || py >= i64::from(mask.height()) {
                continue;
            }
            for dx in -r..=r {
                let px = cx + dx;
                if dx * dx + dy * dy > r * r || px < 0 || px >= i64::from(mask.width()) {
                    continue;
                }
                total += 1;
                if mask.is_skin(px, py) {
                    skin += 1;
                }
            }
        }

        // total >= 1: the center itself is always sampled
        Some(skin as f64 / total as f64)
    }

    /// Whether a wrist landmark lies within the suppression distance of `(x, y)`.
    #[must_use]
    pub fn near_wrist(&self, x: i32, y: i32, landmarks: &LandmarkSet) -> bool {
        let limit = f64::from(self.wrist_factor) * f64::from(self.radius);
        [ids::LEFT_WRIST, ids::RIGHT_WRIST]
            .into_iter()
            .filter_map(|id| landmarks.get(id))
            .any(|wrist| wrist.distance_to(x, y) < limit)
    }

    /// Classify a single position.
    #[must_use]
    pub fn classify_point(&self, x: i32, y: i32, mask: &SkinMask, landmarks: &LandmarkSet) -> Exposure {
        let Some(ratio) = self.skin_ratio(x, y, mask) else {
            return Exposure::Covered;
        };
        if self.near_wrist(x, y, landmarks) {
            return Exposure::Covered;
        }
        Exposure::from(ratio >= f64::from(self.threshold))
    }

    /// Classify every allow-listed landmark present in `landmarks`.
    ///
    /// Entries come back in [`IMPORTANT_IDS`] order; missing IDs are skipped.
    #[must_use]
    pub fn classify(&self, landmarks: &LandmarkSet, mask: &SkinMask) -> Vec<ExposureEntry> {
        IMPORTANT_IDS
            .iter()
            .filter_map(|&id| landmarks.get(id))
            .map(|lm| ExposureEntry {
                id: lm.id,
                x: lm.x,
                y: lm.y,
                name: lm.name.clone(),
                exposure: self.classify_point(lm.x, lm.y, mask, landmarks),
            })
            .collect()
    }
}
