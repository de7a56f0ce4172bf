// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Grouping of classified landmarks into maskable body regions.
//!
//! Each person gets an upper-body and a lower-body cluster. A cluster's box is
//! the padded bounding box of its member landmarks (exposed or not) and it is
//! flagged when any member is exposed. Membership is defined by [`CLUSTERS`].

use crate::config::MaskingConfig;
use crate::exposure::{Exposure, ExposureEntry};
use crate::landmarks::ids;
use crate::results::BBox;

/// Which body region a cluster covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterKind {
    /// Chest, underbust and abdomen.
    Upper,
    /// Hips, genital and upper thighs.
    Lower,
}

impl ClusterKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }
}

/// Membership table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Cluster kind.
    pub kind: ClusterKind,
    /// Member landmark IDs.
    pub members: &'static [u32],
    /// Members whose presence lets the top edge extend further up.
    pub top_anchors: &'static [u32],
}

/// Upper-body members.
pub const UPPER_IDS: [u32; 7] = [
    ids::LEFT_NIPPLE,
    ids::RIGHT_NIPPLE,
    ids::CHEST_CENTER,
    ids::UNDERBUST_CENTER,
    ids::LEFT_UNDERBUST,
    ids::RIGHT_UNDERBUST,
    ids::ABDOMEN_CENTER,
];

/// Lower-body members.
pub const LOWER_IDS: [u32; 5] = [
    ids::GENITAL,
    ids::LEFT_HIP,
    ids::RIGHT_HIP,
    ids::LEFT_UPPER_THIGH_2,
    ids::RIGHT_UPPER_THIGH_2,
];

/// Cluster definitions, upper first.
pub const CLUSTERS: [ClusterSpec; 2] = [
    ClusterSpec {
        kind: ClusterKind::Upper,
        members: &UPPER_IDS,
        top_anchors: &[ids::LEFT_NIPPLE, ids::RIGHT_NIPPLE],
    },
    ClusterSpec {
        kind: ClusterKind::Lower,
        members: &LOWER_IDS,
        top_anchors: &[],
    },
];

/// A padded region and its masking decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCluster {
    /// Cluster kind.
    pub kind: ClusterKind,
    /// Padded box clipped to the frame; zero-area when no member is present.
    pub bbox: BBox,
    /// Whether any member landmark is exposed.
    pub exposed: bool,
    /// Number of member landmarks present.
    pub members: usize,
}

impl RegionCluster {
    /// An unflagged zero-area cluster.
    #[must_use]
    pub const fn empty(kind: ClusterKind) -> Self {
        Self {
            kind,
            bbox: BBox::new(0, 0, 0, 0),
            exposed: false,
            members: 0,
        }
    }

    /// Whether this cluster should be masked.
    #[must_use]
    pub fn needs_masking(&self) -> bool {
        self.exposed && self.bbox.area() > 0
    }
}

/// Builds the upper and lower clusters for one person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionAggregator {
    horizontal_margin: i32,
    vertical_margin: i32,
    top_extension: i32,
}

impl Default for RegionAggregator {
    fn default() -> Self {
        Self::from_config(&MaskingConfig::default())
    }
}

impl RegionAggregator {
    /// Create an aggregator.
    #[must_use]
    pub const fn new(horizontal_margin: i32, vertical_margin: i32, top_extension: i32) -> Self {
        Self {
            horizontal_margin,
            vertical_margin,
            top_extension,
        }
    }

    /// Create an aggregator from the pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &MaskingConfig) -> Self {
        Self::new(
            config.horizontal_margin,
            config.vertical_margin,
            config.nipple_top_extension,
        )
    }

    /// Build one cluster from a person's classified landmarks.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn cluster(
        &self,
        spec: &ClusterSpec,
        entries: &[ExposureEntry],
        width: u32,
        height: u32,
    ) -> RegionCluster {
        let members: Vec<&ExposureEntry> = entries
            .iter()
            .filter(|e| spec.members.contains(&e.id))
            .collect();
        if members.is_empty() {
            return RegionCluster::empty(spec.kind);
        }

        let (w, h) = (width as i32, height as i32);
        let x_min = members.iter().map(|e| e.x).min().unwrap_or(0);
        let x_max = members.iter().map(|e| e.x).max().unwrap_or(0);
        let y_min = members.iter().map(|e| e.y).min().unwrap_or(0);
        let y_max = members.iter().map(|e| e.y).max().unwrap_or(0);

        let mut y1 = y_min.saturating_sub(self.vertical_margin).max(0);
        if let Some(anchor_y) = members
            .iter()
            .filter(|e| spec.top_anchors.contains(&e.id))
            .map(|e| e.y)
            .min()
        {
            y1 = y1.min(anchor_y.saturating_sub(self.top_extension).max(0));
        }

        let bbox = BBox::new(
            x_min.saturating_sub(self.horizontal_margin).max(0),
            y1,
            x_max.saturating_add(self.horizontal_margin).min(w),
            y_max.saturating_add(self.vertical_margin).min(h),
        )
        .clamp_to(width, height);

        RegionCluster {
            kind: spec.kind,
            bbox,
            exposed: members.iter().any(|e| e.exposure == Exposure::Exposed),
            members: members.len(),
        }
    }

    /// Build the upper and lower clusters for one person.
    ///
    /// # Arguments
    ///
    /// * `entries` - The person's classified landmarks.
    /// * `width` - Frame width.
    /// * `height` - Frame height.
    #[must_use]
    pub fn aggregate(
        &self,
        entries: &[ExposureEntry],
        width: u32,
        height: u32,
    ) -> (RegionCluster, RegionCluster) {
        let [upper, lower] = CLUSTERS.map(|spec| self.cluster(&spec, entries, width, height));
        (upper, lower)
    }
}
