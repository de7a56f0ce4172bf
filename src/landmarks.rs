// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Body landmarks and the derivation of anatomical points.
//!
//! A pose model supplies up to 33 *primary* landmarks per person (IDs 0-32,
//! face IDs 0-10). [`LandmarkSet::derive`] expands them into the *derived*
//! points (IDs 36-49) that exposure classification works on. The derivation
//! rules live in the [`DERIVATIONS`] table: each entry names its inputs, how
//! they are combined, and the ID/name it produces. Adding a point means adding
//! a row, not a branch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Landmark IDs referenced by name elsewhere in the crate.
pub mod ids {
    /// Left mouth corner.
    pub const MOUTH_LEFT: u32 = 9;
    /// Right mouth corner.
    pub const MOUTH_RIGHT: u32 = 10;
    /// Left shoulder.
    pub const LEFT_SHOULDER: u32 = 11;
    /// Right shoulder.
    pub const RIGHT_SHOULDER: u32 = 12;
    /// Left wrist.
    pub const LEFT_WRIST: u32 = 15;
    /// Right wrist.
    pub const RIGHT_WRIST: u32 = 16;
    /// Left hip.
    pub const LEFT_HIP: u32 = 23;
    /// Right hip.
    pub const RIGHT_HIP: u32 = 24;
    /// Left knee.
    pub const LEFT_KNEE: u32 = 25;
    /// Right knee.
    pub const RIGHT_KNEE: u32 = 26;
    /// Midpoint of the hips.
    pub const GENITAL: u32 = 36;
    /// Mean of shoulders and hips.
    pub const TORSO_CENTER: u32 = 37;
    /// Left nipple.
    pub const LEFT_NIPPLE: u32 = 38;
    /// Right nipple.
    pub const RIGHT_NIPPLE: u32 = 39;
    /// Midpoint of the nipples.
    pub const CHEST_CENTER: u32 = 40;
    /// Left hip/knee midpoint.
    pub const LEFT_UPPER_THIGH: u32 = 41;
    /// Right hip/knee midpoint.
    pub const RIGHT_UPPER_THIGH: u32 = 42;
    /// Left hip/upper-thigh midpoint.
    pub const LEFT_UPPER_THIGH_2: u32 = 43;
    /// Right hip/upper-thigh midpoint.
    pub const RIGHT_UPPER_THIGH_2: u32 = 44;
    /// Between chest center and torso center.
    pub const UNDERBUST_CENTER: u32 = 45;
    /// Left underbust.
    pub const LEFT_UNDERBUST: u32 = 46;
    /// Right underbust.
    pub const RIGHT_UNDERBUST: u32 = 47;
    /// Between torso center and genital.
    pub const ABDOMEN_CENTER: u32 = 48;
    /// Between mouth and shoulders.
    pub const NECK: u32 = 49;
}

/// Names of the 33 primary pose landmarks, indexed by ID.
pub const PRIMARY_NAMES: [&str; 33] = [
    "Nose",
    "Left Eye Inner",
    "Left Eye",
    "Left Eye Outer",
    "Right Eye Inner",
    "Right Eye",
    "Right Eye Outer",
    "Left Ear",
    "Right Ear",
    "Mouth Left",
    "Mouth Right",
    "Left Shoulder",
    "Right Shoulder",
    "Left Elbow",
    "Right Elbow",
    "Left Wrist",
    "Right Wrist",
    "Left Pinky",
    "Right Pinky",
    "Left Index",
    "Right Index",
    "Left Thumb",
    "Right Thumb",
    "Left Hip",
    "Right Hip",
    "Left Knee",
    "Right Knee",
    "Left Ankle",
    "Right Ankle",
    "Left Heel",
    "Right Heel",
    "Left Foot Index",
    "Right Foot Index",
];

/// Name for a primary landmark ID.
#[must_use]
pub fn primary_name(id: u32) -> String {
    PRIMARY_NAMES
        .get(id as usize)
        .map_or_else(|| format!("Landmark_{id}"), |name| (*name).to_string())
}

/// A primary landmark as produced by a pose model, in crop-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosePoint {
    /// Landmark ID (0-32).
    pub id: u32,
    /// X coordinate relative to the person crop.
    pub x: i32,
    /// Y coordinate relative to the person crop.
    pub y: i32,
}

impl PosePoint {
    /// Create a new pose point.
    #[must_use]
    pub const fn new(id: u32, x: i32, y: i32) -> Self {
        Self { id, x, y }
    }
}

/// A named 2D point on a detected body, in frame coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmark {
    /// Landmark ID (primary 0-32, derived 36+).
    pub id: u32,
    /// X coordinate in pixels.
    pub x: i32,
    /// Y coordinate in pixels.
    pub y: i32,
    /// Human-readable name.
    pub name: String,
}

impl Landmark {
    /// Create a new landmark.
    #[must_use]
    pub fn new(id: u32, x: i32, y: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            x,
            y,
            name: name.into(),
        }
    }

    /// Euclidean distance to a pixel position.
    #[must_use]
    pub fn distance_to(&self, x: i32, y: i32) -> f64 {
        let dx = f64::from(self.x) - f64::from(x);
        let dy = f64::from(self.y) - f64::from(y);
        dx.hypot(dy)
    }
}

/// How a derived landmark is computed from its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Floor-divided midpoint of two landmarks.
    Midpoint(u32, u32),
    /// Floor-divided mean of four landmarks.
    Mean([u32; 4]),
    /// `a * ratio + b * (1 - ratio)`, truncated toward zero.
    Blend {
        /// Landmark weighted by `ratio`.
        a: u32,
        /// Landmark weighted by `1 - ratio`.
        b: u32,
        /// Weight of `a`.
        ratio: f64,
    },
    /// Midpoint of the midpoints of two pairs, truncated toward zero.
    MidpointOfPairs([u32; 4]),
}

impl Rule {
    /// IDs that must all be present for the rule to apply.
    #[must_use]
    pub fn inputs(&self) -> Vec<u32> {
        match *self {
            Self::Midpoint(a, b) | Self::Blend { a, b, .. } => vec![a, b],
            Self::Mean(ids) | Self::MidpointOfPairs(ids) => ids.to_vec(),
        }
    }

    /// Apply the rule, or `None` if any input is missing.
    fn apply(&self, set: &LandmarkSet) -> Option<(i32, i32)> {
        let points = self
            .inputs()
            .into_iter()
            .map(|id| set.get(id).map(|lm| (i64::from(lm.x), i64::from(lm.y))))
            .collect::<Option<Vec<_>>>()?;

        let point = match *self {
            Self::Midpoint(..) => (
                saturate((points[0].0 + points[1].0).div_euclid(2)),
                saturate((points[0].1 + points[1].1).div_euclid(2)),
            ),
            Self::Mean(_) => (
                saturate(points.iter().map(|p| p.0).sum::<i64>().div_euclid(4)),
                saturate(points.iter().map(|p| p.1).sum::<i64>().div_euclid(4)),
            ),
            Self::Blend { ratio, .. } => {
                let blend = |a: i64, b: i64| {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                    let v = (a as f64 * ratio + b as f64 * (1.0 - ratio)) as i32;
                    v
                };
                (
                    blend(points[0].0, points[1].0),
                    blend(points[0].1, points[1].1),
                )
            }
            Self::MidpointOfPairs(_) => {
                #[allow(clippy::cast_precision_loss)]
                let mid = |i: usize| {
                    (
                        (points[i].0 + points[i + 1].0) as f64 / 2.0,
                        (points[i].1 + points[i + 1].1) as f64 / 2.0,
                    )
                };
                let (m1, m2) = (mid(0), mid(2));
                #[allow(clippy::cast_possible_truncation)]
                let p = (((m1.0 + m2.0) / 2.0) as i32, ((m1.1 + m2.1) / 2.0) as i32);
                p
            }
        };
        Some(point)
    }
}

/// Narrow an `i64` coordinate back to `i32`, saturating at the bounds.
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
const fn saturate(v: i64) -> i32 {
    if v > i32::MAX as i64 {
        i32::MAX
    } else if v < i32::MIN as i64 {
        i32::MIN
    } else {
        v as i32
    }
}

/// One row of the derivation table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
    /// Output landmark ID.
    pub id: u32,
    /// Output landmark name.
    pub name: &'static str,
    /// Combination rule.
    pub rule: Rule,
}

/// Derived landmarks, in dependency order.
pub const DERIVATIONS: [Derivation; 14] = {
    use ids::*;
    [
        Derivation {
            id: GENITAL,
            name: "Genital",
            rule: Rule::Midpoint(LEFT_HIP, RIGHT_HIP),
        },
        Derivation {
            id: TORSO_CENTER,
            name: "Torso Center",
            rule: Rule::Mean([LEFT_SHOULDER, RIGHT_SHOULDER, LEFT_HIP, RIGHT_HIP]),
        },
        Derivation {
            id: LEFT_NIPPLE,
            name: "Left Nipple",
            rule: Rule::Midpoint(LEFT_SHOULDER, TORSO_CENTER),
        },
        Derivation {
            id: RIGHT_NIPPLE,
            name: "Right Nipple",
            rule: Rule::Midpoint(RIGHT_SHOULDER, TORSO_CENTER),
        },
        Derivation {
            id: CHEST_CENTER,
            name: "Chest Center",
            rule: Rule::Midpoint(LEFT_NIPPLE, RIGHT_NIPPLE),
        },
        Derivation {
            id: LEFT_UPPER_THIGH,
            name: "Left Upper Thigh",
            rule: Rule::Midpoint(LEFT_HIP, LEFT_KNEE),
        },
        Derivation {
            id: RIGHT_UPPER_THIGH,
            name: "Right Upper Thigh",
            rule: Rule::Midpoint(RIGHT_HIP, RIGHT_KNEE),
        },
        Derivation {
            id: LEFT_UPPER_THIGH_2,
            name: "Left Upper Thigh 2",
            rule: Rule::Midpoint(LEFT_HIP, LEFT_UPPER_THIGH),
        },
        Derivation {
            id: RIGHT_UPPER_THIGH_2,
            name: "Right Upper Thigh 2",
            rule: Rule::Midpoint(RIGHT_HIP, RIGHT_UPPER_THIGH),
        },
        Derivation {
            id: UNDERBUST_CENTER,
            name: "Underbust Center",
            rule: Rule::Blend {
                a: CHEST_CENTER,
                b: TORSO_CENTER,
                ratio: 0.5,
            },
        },
        Derivation {
            id: LEFT_UNDERBUST,
            name: "Left Underbust",
            rule: Rule::Blend {
                a: LEFT_NIPPLE,
                b: LEFT_HIP,
                ratio: 0.8,
            },
        },
        Derivation {
            id: RIGHT_UNDERBUST,
            name: "Right Underbust",
            rule: Rule::Blend {
                a: RIGHT_NIPPLE,
                b: RIGHT_HIP,
                ratio: 0.8,
            },
        },
        Derivation {
            id: ABDOMEN_CENTER,
            name: "Abdomen Center",
            rule: Rule::Blend {
                a: TORSO_CENTER,
                b: GENITAL,
                ratio: 0.5,
            },
        },
        Derivation {
            id: NECK,
            name: "Neck",
            rule: Rule::MidpointOfPairs([MOUTH_LEFT, MOUTH_RIGHT, LEFT_SHOULDER, RIGHT_SHOULDER]),
        },
    ]
};

/// The landmarks of one person, keyed by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkSet {
    points: BTreeMap<u32, Landmark>,
}

impl LandmarkSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from crop-local pose points, translated by the crop origin.
    ///
    /// # Arguments
    ///
    /// * `points` - Primary landmarks relative to the person crop.
    /// * `origin` - Top-left corner `(x, y)` of the crop in the frame.
    #[must_use]
    pub fn from_pose(points: &[PosePoint], origin: (i32, i32)) -> Self {
        let mut set = Self::new();
        for p in points {
            set.insert(Landmark::new(
                p.id,
                p.x.saturating_add(origin.0),
                p.y.saturating_add(origin.1),
                primary_name(p.id),
            ));
        }
        set
    }

    /// Insert or replace a landmark.
    pub fn insert(&mut self, landmark: Landmark) {
        self.points.insert(landmark.id, landmark);
    }

    /// Get a landmark by ID.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Landmark> {
        self.points.get(&id)
    }

    /// Check whether an ID is present.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.points.contains_key(&id)
    }

    /// Number of landmarks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over landmarks in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.points.values()
    }

    /// Add every derived landmark whose inputs are present.
    ///
    /// Rows with a missing input are skipped without error, and so are rows
    /// that depend on them.
    pub fn derive(&mut self) {
        for row in &DERIVATIONS {
            if let Some((x, y)) = row.rule.apply(self) {
                self.insert(Landmark::new(row.id, x, y, row.name));
            }
        }
    }

    /// Convenience: build from pose points and derive in one step.
    #[must_use]
    pub fn derived_from_pose(points: &[PosePoint], origin: (i32, i32)) -> Self {
        let mut set = Self::from_pose(points, origin);
        set.derive();
        set
    }
}

#[cfg(test)]
mod tests {
    use super::ids::*;
    use super::*;

    fn torso() -> Vec<PosePoint> {
        vec![
            PosePoint::new(MOUTH_LEFT, 105, 41),
            PosePoint::new(MOUTH_RIGHT, 95, 40),
            PosePoint::new(LEFT_SHOULDER, 140, 100),
            PosePoint::new(RIGHT_SHOULDER, 61, 103),
            PosePoint::new(LEFT_HIP, 130, 250),
            PosePoint::new(RIGHT_HIP, 71, 251),
            PosePoint::new(LEFT_KNEE, 131, 380),
            PosePoint::new(RIGHT_KNEE, 70, 379),
        ]
    }

    #[test]
    fn test_primary_translated_by_origin() {
        let set = LandmarkSet::from_pose(&[PosePoint::new(LEFT_HIP, 10, 20)], (100, 50));
        let hip = set.get(LEFT_HIP).unwrap();
        assert_eq!((hip.x, hip.y), (110, 70));
        assert_eq!(hip.name, "Left Hip");
    }

    #[test]
    fn test_torso_center_is_mean_of_shoulders_and_hips() {
        let set = LandmarkSet::derived_from_pose(&torso(), (0, 0));
        let tc = set.get(TORSO_CENTER).unwrap();
        let mean_x = f64::from(140 + 61 + 130 + 71) / 4.0;
        let mean_y = f64::from(100 + 103 + 250 + 251) / 4.0;
        assert!((f64::from(tc.x) - mean_x).abs() < 1.0);
        assert!((f64::from(tc.y) - mean_y).abs() < 1.0);
    }

    #[test]
    fn test_derived_values() {
        let set = LandmarkSet::derived_from_pose(&torso(), (0, 0));
        // (130 + 71) // 2, (250 + 251) // 2
        assert_eq!(set.get(GENITAL).map(|l| (l.x, l.y)), Some((100, 250)));
        // 402 // 4, 704 // 4
        assert_eq!(set.get(TORSO_CENTER).map(|l| (l.x, l.y)), Some((100, 176)));
        assert_eq!(set.get(LEFT_NIPPLE).map(|l| (l.x, l.y)), Some((120, 138)));
        assert_eq!(set.get(RIGHT_NIPPLE).map(|l| (l.x, l.y)), Some((80, 139)));
        assert_eq!(set.get(CHEST_CENTER).map(|l| (l.x, l.y)), Some((100, 138)));
        assert_eq!(set.get(LEFT_UPPER_THIGH).map(|l| (l.x, l.y)), Some((130, 315)));
        assert_eq!(set.get(LEFT_UPPER_THIGH_2).map(|l| (l.x, l.y)), Some((130, 282)));
        assert_eq!(set.get(UNDERBUST_CENTER).map(|l| (l.x, l.y)), Some((100, 157)));
        // 120 * 0.8 + 130 * 0.2 = 122, 138 * 0.8 + 250 * 0.2 = 160.4
        assert_eq!(set.get(LEFT_UNDERBUST).map(|l| (l.x, l.y)), Some((122, 160)));
        assert_eq!(set.get(ABDOMEN_CENTER).map(|l| (l.x, l.y)), Some((100, 213)));
        // mouth mid (100, 40.5), shoulder mid (100.5, 101.5)
        assert_eq!(set.get(NECK).map(|l| (l.x, l.y)), Some((100, 71)));
        assert_eq!(set.get(NECK).unwrap().name, "Neck");
    }

    #[test]
    fn test_neck_absent_without_mouth() {
        for missing in [MOUTH_LEFT, MOUTH_RIGHT, LEFT_SHOULDER, RIGHT_SHOULDER] {
            let points: Vec<_> = torso().into_iter().filter(|p| p.id != missing).collect();
            let set = LandmarkSet::derived_from_pose(&points, (0, 0));
            assert!(!set.contains(NECK), "neck derived without {missing}");
        }
    }

    #[test]
    fn test_missing_inputs_skip_dependents() {
        let points: Vec<_> = torso()
            .into_iter()
            .filter(|p| p.id != RIGHT_SHOULDER)
            .collect();
        let set = LandmarkSet::derived_from_pose(&points, (0, 0));

        assert!(set.contains(GENITAL));
        assert!(!set.contains(TORSO_CENTER));
        assert!(!set.contains(LEFT_NIPPLE));
        assert!(!set.contains(CHEST_CENTER));
        assert!(!set.contains(UNDERBUST_CENTER));
        assert!(!set.contains(ABDOMEN_CENTER));
        assert!(set.contains(LEFT_UPPER_THIGH_2));
    }

    #[test]
    fn test_empty_pose_derives_nothing() {
        let set = LandmarkSet::derived_from_pose(&[], (0, 0));
        assert!(set.is_empty());
    }

    #[test]
    fn test_rule_inputs() {
        assert_eq!(Rule::Midpoint(1, 2).inputs(), vec![1, 2]);
        assert_eq!(Rule::Mean([1, 2, 3, 4]).inputs().len(), 4);
        for row in &DERIVATIONS {
            assert!(row.id >= 36);
            assert!(!row.rule.inputs().contains(&row.id));
        }
    }

    #[test]
    fn test_extreme_coordinates_saturate() {
        let points = [PosePoint::new(LEFT_HIP, i32::MAX, 10), PosePoint::new(RIGHT_HIP, 10, 10)];
        let set = LandmarkSet::derived_from_pose(&points, (5, 0));
        assert_eq!(set.get(LEFT_HIP).map(|l| l.x), Some(i32::MAX));
        // (i32::MAX + 10) // 2 computed without wrapping
        let expected = (i64::from(i32::MAX) + 10) / 2;
        assert_eq!(set.get(GENITAL).map(|l| i64::from(l.x)), Some(expected));

        let points = [
            PosePoint::new(LEFT_HIP, i32::MAX - 10, 0),
            PosePoint::new(RIGHT_HIP, i32::MAX - 10, 0),
        ];
        let set = LandmarkSet::derived_from_pose(&points, (0, 0));
        assert_eq!(set.get(GENITAL).map(|l| l.x), Some(i32::MAX - 10));
        assert_eq!(set.get(LEFT_UPPER_THIGH).map(|l| l.x), None);

        let far = Landmark::new(0, i32::MIN, 0, "far");
        assert!(far.distance_to(i32::MAX, 0) > 4.0e9);
    }

    #[test]
    fn test_unknown_primary_name() {
        assert_eq!(primary_name(40), "Landmark_40");
        assert_eq!(primary_name(0), "Nose");
    }
}
