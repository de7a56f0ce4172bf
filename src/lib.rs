// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Exposure Mask
//!
//! Finds uncovered body regions of one identified person in images and
//! videos and blurs them.
//!
//! Each frame runs through a fixed sequence of stages:
//!
//! 1. **Person detection** and **pose estimation** per person crop.
//! 2. **Landmark derivation**: 33 pose keypoints are expanded into named
//!    anatomical points from a declarative table ([`landmarks`]).
//! 3. **Skin mask**: person segmentation combined with an HSV skin range
//!    ([`skin`]).
//! 4. **Exposure classification**: the skin fraction inside a disk around each
//!    allow-listed landmark, with suppression near the wrists ([`exposure`]).
//! 5. **Identity reconciliation**: the reference face is matched against the
//!    detected faces and the person whose box contains it becomes the target
//!    ([`identity`]).
//! 6. **Region aggregation** into an upper and a lower cluster ([`regions`])
//!    and **masking** of the flagged clusters by repeated Gaussian blur
//!    ([`masking`]).
//!
//! The models behind stage 1, 3 and 5 are injected through [`Capabilities`].
//! The [`models`] module provides ONNX Runtime adapters; tests use in-process
//! doubles.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use exposure_mask::{MaskingConfig, MaskingPipeline, ModelPaths, gallery};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MaskingConfig::new().with_diagnostics(false);
//!     let caps = ModelPaths {
//!         detector: "yolo11n.onnx".into(),
//!         pose: "pose_landmark.onnx".into(),
//!         segmenter: "person_segmentation.onnx".into(),
//!         face_detector: "yolo11n-face.onnx".into(),
//!         face_embedder: "arcface.onnx".into(),
//!     }
//!     .load(&config)?;
//!
//!     let reference = gallery::load_faces("reference.json")?;
//!     let frame = exposure_mask::io::load_image("photo.jpg")?.to_rgb8();
//!
//!     let mut pipeline = MaskingPipeline::new(caps, config);
//!     let outcome = pipeline.process_image(&frame, &reference)?;
//!     for message in outcome.verdict.messages() {
//!         println!("{message}");
//!     }
//!     outcome.image.save("photo_masked.jpg")?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Build a reference face from a few photos
//! exposure-mask register --images me1.jpg me2.jpg me3.jpg --output reference.json
//!
//! # Mask an image, writing artifacts to runs/mask, runs/mask2, ...
//! exposure-mask mask --source photo.jpg --reference reference.json
//!
//! # Mask a video (requires the `video` feature)
//! exposure-mask mask --source clip.mp4 --reference reference.json
//! ```
//!
//! For every image the `mask` command writes `<stem>_landmark.json` (the
//! exposure report), `masked_<name>` (exposure markers), `<stem>_bbox.jpg`
//! (person and face boxes) and `<stem>_masked.jpg` (the final image).
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `annotate` | yes | Diagnostic images with boxes, labels and markers |
//! | `video` | no | Video decoding and H.264 re-encoding via `video-rs` |
//! | `cuda` | no | CUDA execution provider |
//! | `coreml` | no | `CoreML` execution provider |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod cli;
pub mod config;
pub mod error;
pub mod exposure;
pub mod gallery;
pub mod identity;
pub mod io;
pub mod landmarks;
pub mod masking;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod regions;
pub mod results;
pub mod skin;
pub mod source;
pub mod utils;

// Re-export main types for convenience
pub use config::MaskingConfig;
pub use error::{MaskingError, Result};
pub use exposure::{Exposure, ExposureClassifier, ExposureEntry};
pub use identity::{SimilarityMetric, SimilarityPolicy, find_person_for_faces, match_gallery};
pub use landmarks::{Landmark, LandmarkSet, PosePoint};
pub use masking::MaskApplier;
pub use models::{Capabilities, ModelPaths};
pub use pipeline::MaskingPipeline;
pub use regions::{RegionAggregator, RegionCluster};
pub use results::{BBox, FaceRecord, FrameOutcome, PersonRecord, PersonReport, Verdict};
pub use skin::{SkinMask, build_skin_mask};
pub use source::{Source, SourceIterator, SourceMeta};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
