// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Face record files and embedding helpers.
//!
//! A face file is a JSON array of `{"person", "bbox", "embedding"}` objects,
//! `person` being optional. Reference files written by registration hold a
//! single averaged, unit-length embedding.

use std::path::Path;

use image::RgbImage;

use crate::error::{MaskingError, Result};
use crate::models::FaceAnalyzer;
use crate::results::FaceRecord;

/// Most images used for a registration.
pub const MAX_REGISTRATION_IMAGES: usize = 5;

/// Load face records from a JSON file.
///
/// # Errors
///
/// Returns `InputUnavailable` if the file cannot be read and `ReportError` if
/// it is not a valid face array.
pub fn load_faces<P: AsRef<Path>>(path: P) -> Result<Vec<FaceRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        MaskingError::InputUnavailable(format!("Failed to read {}: {e}", path.display()))
    })?;
    let faces: Vec<FaceRecord> = serde_json::from_str(&content)?;
    Ok(faces)
}

/// Write face records as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_faces<P: AsRef<Path>>(path: P, faces: &[FaceRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(faces)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Scale a vector to unit length; zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Average a set of embeddings and normalize the result.
///
/// Each input is normalized before averaging so every image counts equally.
///
/// # Errors
///
/// Returns `ConfigError` if no embeddings are given or their lengths differ.
#[allow(clippy::cast_precision_loss)]
pub fn average_embeddings(embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = embeddings
        .first()
        .ok_or_else(|| MaskingError::ConfigError("No embeddings to average".to_string()))?;
    let dim = first.len();
    if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
        return Err(MaskingError::ConfigError(
            "Embeddings must be non-empty and of equal length".to_string(),
        ));
    }

    let mut mean = vec![0.0_f32; dim];
    for embedding in embeddings {
        let mut unit = embedding.clone();
        l2_normalize(&mut unit);
        for (m, x) in mean.iter_mut().zip(&unit) {
            *m += x;
        }
    }
    let n = embeddings.len() as f32;
    for m in &mut mean {
        *m /= n;
    }
    l2_normalize(&mut mean);
    Ok(mean)
}

/// Largest face by box area, the first one on ties.
#[must_use]
pub fn largest_face(faces: &[FaceRecord]) -> Option<&FaceRecord> {
    faces.iter().reduce(|best, f| if f.bbox.area() > best.bbox.area() { f } else { best })
}

/// Build a reference record from registration images.
///
/// The largest face with an embedding is taken from each of the first
/// [`MAX_REGISTRATION_IMAGES`] images; their embeddings are averaged. The
/// record keeps the box of the first contributing face.
///
/// # Errors
///
/// Returns `InputUnavailable` if no image yields a face, or any analyzer error.
pub fn build_reference(analyzer: &mut dyn FaceAnalyzer, images: &[RgbImage]) -> Result<FaceRecord> {
    let mut embeddings = Vec::new();
    let mut bbox = None;
    for image in images.iter().take(MAX_REGISTRATION_IMAGES) {
        let faces = analyzer.analyze(image)?;
        let usable: Vec<FaceRecord> = faces.into_iter().filter(|f| !f.embedding.is_empty()).collect();
        if let Some(face) = largest_face(&usable) {
            bbox.get_or_insert(face.bbox);
            embeddings.push(face.embedding.clone());
        }
    }

    let Some(bbox) = bbox else {
        return Err(MaskingError::InputUnavailable(
            "No face found in registration images".to_string(),
        ));
    };
    let mut record = FaceRecord::new(bbox, average_embeddings(&embeddings)?);
    record.person = Some(0);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::BBox;

    #[test]
    fn test_save_and_load_faces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ref.json");
        let mut face = FaceRecord::new(BBox::new(1, 2, 30, 40), vec![0.6, 0.8]);
        face.person = Some(3);

        save_faces(&path, std::slice::from_ref(&face)).unwrap();
        let loaded = load_faces(&path).unwrap();
        assert_eq!(loaded, vec![face]);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_faces(dir.path().join("missing.json")),
            Err(MaskingError::InputUnavailable(_))
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(load_faces(&bad), Err(MaskingError::ReportError(_))));

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(load_faces(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_average_embeddings() {
        let avg = average_embeddings(&[vec![2.0, 0.0], vec![0.0, 5.0]]).unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((avg[0] - expected).abs() < 1e-6);
        assert!((avg[1] - expected).abs() < 1e-6);

        assert!(average_embeddings(&[]).is_err());
        assert!(average_embeddings(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    struct FixedFaces(Vec<Vec<FaceRecord>>);

    impl FaceAnalyzer for FixedFaces {
        fn analyze(&mut self, _frame: &RgbImage) -> Result<Vec<FaceRecord>> {
            Ok(if self.0.is_empty() { Vec::new() } else { self.0.remove(0) })
        }
    }

    #[test]
    fn test_build_reference_averages_largest_faces() {
        let mut analyzer = FixedFaces(vec![
            vec![
                FaceRecord::new(BBox::new(0, 0, 5, 5), vec![0.0, 1.0]),
                FaceRecord::new(BBox::new(0, 0, 50, 50), vec![1.0, 0.0]),
            ],
            vec![],
            vec![FaceRecord::new(BBox::new(10, 10, 40, 40), vec![0.0, 1.0])],
        ]);
        let images = vec![RgbImage::new(4, 4); 3];

        let reference = build_reference(&mut analyzer, &images).unwrap();
        assert_eq!(reference.person, Some(0));
        assert_eq!(reference.bbox, BBox::new(0, 0, 50, 50));
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((reference.embedding[0] - expected).abs() < 1e-6);
        assert!((reference.embedding[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_build_reference_without_faces() {
        let mut analyzer = FixedFaces(vec![vec![FaceRecord::new(BBox::new(0, 0, 9, 9), vec![])]]);
        let result = build_reference(&mut analyzer, &[RgbImage::new(4, 4)]);
        assert!(matches!(result, Err(MaskingError::InputUnavailable(_))));
    }

    #[test]
    fn test_largest_face() {
        let faces = vec![
            FaceRecord::new(BBox::new(0, 0, 10, 10), vec![]),
            FaceRecord::new(BBox::new(0, 0, 20, 20), vec![]),
            FaceRecord::new(BBox::new(5, 5, 25, 25), vec![]),
        ];
        assert_eq!(largest_face(&faces).unwrap().bbox, BBox::new(0, 0, 20, 20));
        assert!(largest_face(&[]).is_none());
    }
}
