// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Utility functions for box filtering and frame conversion

use image::RgbImage;
use ndarray::Array3;

use crate::error::{MaskingError, Result};

/// Calculate `IoU` (Intersection over Union) between two bounding boxes
///
/// # Arguments
///
/// * `box1` - First bounding box [x1, y1, x2, y2]
/// * `box2` - Second bounding box [x1, y1, x2, y2]
///
/// # Returns
///
/// `IoU` value between 0.0 and 1.0
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = ((x2 - x1).max(0.0)) * ((y2 - y1).max(0.0));

    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Non-Maximum Suppression (NMS) for filtering overlapping detections
///
/// # Arguments
///
/// * `boxes` - Vector of bounding boxes with scores [(bbox, score)]
/// * `iou_threshold` - `IoU` threshold for suppression
///
/// # Returns
///
/// Indices of boxes to keep, highest score first
#[must_use]
pub fn nms(boxes: &[([f32; 4], f32)], iou_threshold: f32) -> Vec<usize> {
    if boxes.is_empty() {
        return vec![];
    }

    // Sort by score (descending); stable so equal scores keep input order
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| boxes[b].1.total_cmp(&boxes[a].1));

    let mut keep = vec![];
    let mut suppressed = vec![false; boxes.len()];

    for &i in &indices {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &indices {
            if !suppressed[j] && i != j {
                let iou = calculate_iou(&boxes[i].0, &boxes[j].0);
                if iou > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
    }

    keep
}

/// Convert an HWC ndarray (RGB, u8) into an `RgbImage`.
///
/// # Errors
///
/// Returns an error if the array is not `(H, W, 3)` or too large.
pub fn array_to_image(arr: &Array3<u8>) -> Result<RgbImage> {
    let shape = arr.shape();
    if shape[2] != 3 {
        return Err(MaskingError::ImageError(format!(
            "Expected 3 channels, got {}",
            shape[2]
        )));
    }
    let height = u32::try_from(shape[0])
        .map_err(|_| MaskingError::ImageError("Image height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| MaskingError::ImageError("Image width exceeds u32::MAX".to_string()))?;

    // Iterating in logical order copes with non-standard layouts
    let rgb_data: Vec<u8> = arr.iter().copied().collect();

    RgbImage::from_raw(width, height, rgb_data)
        .ok_or_else(|| MaskingError::ImageError("Failed to create image from array".to_string()))
}

/// Convert an `RgbImage` into an HWC ndarray.
///
/// # Errors
///
/// Returns an error if the pixel buffer does not match the dimensions.
pub fn image_to_array(image: &RgbImage) -> Result<Array3<u8>> {
    let (width, height) = image.dimensions();
    Array3::from_shape_vec((height as usize, width as usize, 3), image.as_raw().clone())
        .map_err(|e| MaskingError::ImageError(format!("Failed to create array from image: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_calculate_iou() {
        let box1 = [0.0, 0.0, 10.0, 10.0];
        let box2 = [5.0, 5.0, 15.0, 15.0];
        let iou = calculate_iou(&box1, &box2);
        assert!((iou - 0.142_857).abs() < 0.001); // 25 / (100 + 100 - 25)
        assert!(calculate_iou(&[0.0; 4], &[0.0; 4]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nms() {
        let boxes = vec![
            ([0.0, 0.0, 10.0, 10.0], 0.9),
            ([1.0, 1.0, 11.0, 11.0], 0.8),
            ([100.0, 100.0, 110.0, 110.0], 0.95),
        ];
        let keep = nms(&boxes, 0.5);
        assert_eq!(keep, vec![2, 0]);
        assert!(nms(&[], 0.5).is_empty());
    }

    #[test]
    fn test_image_array_roundtrip_preserves_pixels() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let arr = image_to_array(&img).unwrap();
        assert_eq!(arr.shape(), &[2, 3, 3]);
        assert_eq!(arr[[1, 2, 0]], 2);
        assert_eq!(arr[[1, 2, 1]], 1);
        assert_eq!(array_to_image(&arr).unwrap(), img);
    }

    #[test]
    fn test_array_to_image_rejects_gray() {
        let arr = Array3::<u8>::zeros((2, 2, 1));
        assert!(array_to_image(&arr).is_err());
    }
}
