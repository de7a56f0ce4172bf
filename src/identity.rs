// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Identity reconciliation.
//!
//! Two independent questions are answered here:
//!
//! - **Gallery matching**: which detected face belongs to the reference
//!   identity? Embeddings are compared through a [`SimilarityPolicy`], either
//!   [`CosineSimilarity`] (higher is better) or [`EuclideanDistance`] (lower is
//!   better).
//! - **Containment matching**: which detected body owns a face? The first
//!   person whose box fully contains a face box wins.

use crate::results::{BBox, FaceRecord, PersonRecord};

/// Embedding comparison strategy, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    /// Cosine similarity, match if `score >= threshold`.
    #[default]
    Cosine,
    /// Euclidean distance, match if `distance < threshold`.
    Euclidean,
}

impl SimilarityMetric {
    /// Default match threshold for this metric.
    #[must_use]
    pub const fn default_threshold(self) -> f32 {
        match self {
            Self::Cosine => 0.5,
            Self::Euclidean => 0.65,
        }
    }

    /// Build the policy for this metric with the given threshold.
    #[must_use]
    pub fn policy(self, threshold: f32) -> Box<dyn SimilarityPolicy> {
        match self {
            Self::Cosine => Box::new(CosineSimilarity::new(threshold)),
            Self::Euclidean => Box::new(EuclideanDistance::new(threshold)),
        }
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(format!("unknown similarity metric '{other}'")),
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Compare-and-threshold contract shared by the embedding metrics.
pub trait SimilarityPolicy {
    /// Score two embeddings of equal length.
    fn score(&self, query: &[f32], candidate: &[f32]) -> f32;

    /// Whether `candidate` is a strictly better score than `best`.
    fn is_better(&self, candidate: f32, best: f32) -> bool;

    /// Whether a score clears the match threshold.
    fn accepts(&self, score: f32) -> bool;

    /// The threshold in effect.
    fn threshold(&self) -> f32;
}

/// Cosine similarity; the highest score wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosineSimilarity {
    threshold: f32,
}

impl CosineSimilarity {
    /// Create a cosine policy.
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl SimilarityPolicy for CosineSimilarity {
    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        cosine_similarity(query, candidate)
    }

    fn is_better(&self, candidate: f32, best: f32) -> bool {
        candidate > best
    }

    fn accepts(&self, score: f32) -> bool {
        score >= self.threshold
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Euclidean distance; the lowest distance wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanDistance {
    threshold: f32,
}

impl EuclideanDistance {
    /// Create a Euclidean policy.
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl SimilarityPolicy for EuclideanDistance {
    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        euclidean_distance(query, candidate)
    }

    fn is_better(&self, candidate: f32, best: f32) -> bool {
        candidate < best
    }

    fn accepts(&self, score: f32) -> bool {
        score < self.threshold
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Cosine similarity of two vectors, `0.0` if either has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Euclidean distance between two vectors.
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Best gallery match for a reference identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    /// Index into the gallery.
    pub index: usize,
    /// Box of the matched gallery face.
    pub bbox: BBox,
    /// Similarity or distance, depending on the policy.
    pub score: f32,
}

/// Match the first query face against a gallery of faces.
///
/// Gallery entries with an empty embedding, or one whose length differs from
/// the query, are skipped. On equal scores the earlier entry is kept.
///
/// # Arguments
///
/// * `query` - Reference faces; only the first one is used.
/// * `gallery` - Candidate faces, typically those detected in the frame.
/// * `policy` - Comparison strategy and threshold.
///
/// # Returns
///
/// The best match if it clears the threshold, otherwise `None`. Empty inputs
/// return `None`.
#[must_use]
pub fn match_gallery(
    query: &[FaceRecord],
    gallery: &[FaceRecord],
    policy: &dyn SimilarityPolicy,
) -> Option<FaceMatch> {
    let reference = query.first()?;
    if reference.embedding.is_empty() {
        return None;
    }

    let mut best: Option<FaceMatch> = None;
    for (index, face) in gallery.iter().enumerate() {
        if face.embedding.is_empty() || face.embedding.len() != reference.embedding.len() {
            continue;
        }
        let score = policy.score(&reference.embedding, &face.embedding);
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|b| policy.is_better(score, b.score)) {
            best = Some(FaceMatch {
                index,
                bbox: face.bbox,
                score,
            });
        }
    }

    best.filter(|b| policy.accepts(b.score))
}

/// Find the first person whose box contains at least one of the face boxes.
///
/// Persons are visited in order and, for each, faces in order; the first
/// containment found wins.
///
/// # Returns
///
/// Index into `persons`, or `None` if no person contains any face.
#[must_use]
pub fn find_person_for_faces(faces: &[BBox], persons: &[PersonRecord]) -> Option<usize> {
    persons
        .iter()
        .position(|person| faces.iter().any(|face| person.bbox.contains(face)))
}
