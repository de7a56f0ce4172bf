// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! I/O utilities: image loading, report files and video encoding.

#[cfg(feature = "video")]
use video_rs::{Encoder, Time, encode::Settings as EncoderSettings};

use crate::error::{MaskingError, Result};
use crate::results::{FrameOutcome, PersonReport};
use crate::source::SourceMeta;
use image::{DynamicImage, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[cfg(feature = "video")]
use std::sync::Once;

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// Initialize `video-rs` once. Safe to call multiple times.
#[allow(clippy::missing_const_for_fn)]
pub fn init_logging() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::warn!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Load an image, decoding JPEGs with `jpeg-decoder` first.
///
/// # Errors
///
/// Returns `InputUnavailable` if the file cannot be opened or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if matches!(ext.as_deref(), Some("jpg" | "jpeg"))
        && let Ok(file) = File::open(path)
    {
        let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
        if let Ok(pixels) = decoder.decode()
            && let Some(info) = decoder.info()
        {
            let (width, height) = (u32::from(info.width), u32::from(info.height));
            match info.pixel_format {
                jpeg_decoder::PixelFormat::RGB24 => {
                    if let Some(buffer) = RgbImage::from_raw(width, height, pixels) {
                        return Ok(DynamicImage::ImageRgb8(buffer));
                    }
                }
                jpeg_decoder::PixelFormat::L8 => {
                    if let Some(buffer) = image::GrayImage::from_raw(width, height, pixels) {
                        return Ok(DynamicImage::ImageLuma8(buffer));
                    }
                }
                _ => {}
            }
        }
    }

    image::open(path).map_err(|e| {
        MaskingError::InputUnavailable(format!("Failed to load {}: {e}", path.display()))
    })
}

/// Write the exposure report as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_report<P: AsRef<Path>>(path: P, report: &[PersonReport]) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path.as_ref(), json).map_err(|e| {
        MaskingError::IoError(format!("Failed to write {}: {e}", path.as_ref().display()))
    })
}

/// Read an exposure report written by [`write_report`].
///
/// # Errors
///
/// Returns `InputUnavailable` if the file cannot be read and `ReportError` if
/// it is malformed.
pub fn read_report<P: AsRef<Path>>(path: P) -> Result<Vec<PersonReport>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        MaskingError::InputUnavailable(format!("Failed to read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Find the next available run directory (mask, mask2, mask3, etc.)
pub fn find_next_run_dir(base: &str, prefix: &str) -> String {
    let base_path = Path::new(base);

    let first = base_path.join(prefix);
    if !first.exists() {
        return first.to_string_lossy().to_string();
    }

    for i in 2.. {
        let numbered = base_path.join(format!("{prefix}{i}"));
        if !numbered.exists() {
            return numbered.to_string_lossy().to_string();
        }
    }

    base_path.join(prefix).to_string_lossy().to_string()
}

/// Output paths for the artifacts of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<stem>_landmark.json`
    pub report: PathBuf,
    /// `masked_<name>`, exposure markers.
    pub exposure: PathBuf,
    /// `<stem>_bbox.jpg`
    pub boxes: PathBuf,
    /// `<stem>_masked.jpg`
    pub masked: PathBuf,
}

impl ArtifactPaths {
    /// Derive artifact paths in `save_dir` from a source path.
    #[must_use]
    pub fn new(save_dir: &Path, source_path: &str) -> Self {
        let source = Path::new(source_path);
        let stem = source
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().to_string());
        let name = source
            .file_name()
            .map_or_else(|| format!("{stem}.jpg"), |s| s.to_string_lossy().to_string());

        Self {
            report: save_dir.join(format!("{stem}_landmark.json")),
            exposure: save_dir.join(format!("masked_{name}")),
            boxes: save_dir.join(format!("{stem}_bbox.jpg")),
            masked: save_dir.join(format!("{stem}_masked.jpg")),
        }
    }
}

/// A wrapper around `video-rs` encoder to simplify video saving.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    width: usize,
    height: usize,
    path: PathBuf,
}

#[cfg(feature = "video")]
impl std::fmt::Debug for VideoWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoWriter")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create a new `VideoWriter`.
    ///
    /// # Arguments
    ///
    /// * `path` - Output video path (e.g., "output.mp4").
    /// * `width` - Video width.
    /// * `height` - Video height.
    /// * `fps` - Frames per second.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder cannot be initialized.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f32) -> Result<Self> {
        init_logging();
        let output_path = path.as_ref().to_path_buf();

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MaskingError::IoError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let settings = EncoderSettings::preset_h264_yuv420p(width, height, false);
        let encoder = Encoder::new(output_path.as_path(), settings).map_err(|e| {
            MaskingError::VideoError(format!("Failed to create video encoder: {e}"))
        })?;

        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        let frame_duration = Time::from_secs_f64(1.0 / f64::from(fps));

        Ok(Self {
            encoder,
            frame_duration,
            position: Time::zero(),
            width,
            height,
            path: output_path,
        })
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a frame to the video.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or frame dimensions don't match.
    pub fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if width != self.width || height != self.height {
            return Err(MaskingError::VideoError(format!(
                "Frame dimensions {}x{} do not match video dimensions {}x{}",
                width, height, self.width, self.height
            )));
        }

        let frame_array = crate::utils::image_to_array(frame)?;
        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| MaskingError::VideoError(format!("Failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    /// Finish writing the video.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(mut self) -> Result<()> {
        self.encoder.finish().map_err(|e| {
            MaskingError::VideoError(format!("Failed to finish video encoding: {e}"))
        })
    }

    /// Drop the encoder and delete the partial output.
    pub fn abort(self) {
        let path = self.path.clone();
        drop(self);
        if path.exists()
            && let Err(e) = std::fs::remove_file(&path)
        {
            crate::warn!("Failed to remove partial video {}: {e}", path.display());
        }
    }
}

/// Persists per-image artifacts for frame outcomes.
///
/// Video jobs are encoded by [`crate::MaskingPipeline::process_video`] into
/// [`SaveResults::video_path`].
#[derive(Debug)]
pub struct SaveResults {
    save_dir: PathBuf,
}

impl SaveResults {
    /// Create a new `SaveResults` writing into `save_dir`.
    #[must_use]
    pub const fn new(save_dir: PathBuf) -> Self {
        Self { save_dir }
    }

    /// Output directory.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Path of the re-encoded video for a source, `<stem>.mp4`.
    #[must_use]
    pub fn video_path(&self, source_path: &str) -> PathBuf {
        let stem = Path::new(source_path)
            .file_stem()
            .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
        self.save_dir.join(format!("{stem}.mp4"))
    }

    /// Save one processed image: the report, the diagnostic renderings (when
    /// present) and the final image.
    ///
    /// # Errors
    ///
    /// Returns an error if any artifact cannot be written.
    pub fn save(&self, meta: &SourceMeta, outcome: &FrameOutcome) -> Result<()> {
        if !self.save_dir.exists() {
            std::fs::create_dir_all(&self.save_dir)
                .map_err(|e| MaskingError::IoError(e.to_string()))?;
        }

        let paths = ArtifactPaths::new(&self.save_dir, &meta.path);
        write_report(&paths.report, &outcome.report)?;
        if let Some(diagnostics) = &outcome.diagnostics {
            diagnostics.exposure.save(&paths.exposure)?;
            diagnostics.boxes.save(&paths.boxes)?;
        }
        outcome.image.save(&paths.masked)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::{Exposure, ExposureEntry};
    use crate::results::{BBox, Diagnostics, Verdict};
    use image::Rgb;

    fn outcome(diagnostics: bool) -> FrameOutcome {
        let image = RgbImage::from_pixel(8, 6, Rgb([10, 20, 30]));
        FrameOutcome {
            report: vec![PersonReport {
                person: 0,
                bbox: BBox::new(0, 0, 8, 6),
                landmarks: vec![ExposureEntry {
                    id: 38,
                    x: 2,
                    y: 3,
                    name: "Left Nipple".to_string(),
                    exposure: Exposure::Exposed,
                }],
            }],
            target: Some(0),
            clusters: None,
            image: image.clone(),
            diagnostics: diagnostics.then(|| Diagnostics {
                exposure: image.clone(),
                boxes: image,
            }),
            verdict: Verdict::default(),
        }
    }

    fn meta(path: &str) -> SourceMeta {
        SourceMeta {
            path: path.to_string(),
            ..SourceMeta::default()
        }
    }

    #[test]
    fn test_find_next_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_string_lossy().to_string();
        let first = find_next_run_dir(&base, "mask");
        assert!(first.ends_with("mask"));
        std::fs::create_dir_all(&first).unwrap();
        assert!(find_next_run_dir(&base, "mask").ends_with("mask2"));
    }

    #[test]
    fn test_artifact_paths() {
        let paths = ArtifactPaths::new(Path::new("runs/mask"), "photos/beach.png");
        assert_eq!(paths.report, Path::new("runs/mask/beach_landmark.json"));
        assert_eq!(paths.exposure, Path::new("runs/mask/masked_beach.png"));
        assert_eq!(paths.boxes, Path::new("runs/mask/beach_bbox.jpg"));
        assert_eq!(paths.masked, Path::new("runs/mask/beach_masked.jpg"));

        let unnamed = ArtifactPaths::new(Path::new("out"), "");
        assert_eq!(unnamed.masked, Path::new("out/image_masked.jpg"));
    }

    #[test]
    fn test_save_image_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("mask");
        let saver = SaveResults::new(save_dir.clone());
        saver.save(&meta("in/p.png"), &outcome(true)).unwrap();

        let paths = ArtifactPaths::new(&save_dir, "in/p.png");
        assert!(paths.exposure.exists());
        assert!(paths.boxes.exists());
        assert!(paths.masked.exists());

        let report = read_report(&paths.report).unwrap();
        assert_eq!(report, outcome(false).report);
    }

    #[test]
    fn test_save_without_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let saver = SaveResults::new(dir.path().to_path_buf());
        saver.save(&meta("q.jpg"), &outcome(false)).unwrap();

        let paths = ArtifactPaths::new(dir.path(), "q.jpg");
        assert!(paths.report.exists());
        assert!(paths.masked.exists());
        assert!(!paths.boxes.exists());
    }

    #[test]
    fn test_video_path_uses_source_stem() {
        let saver = SaveResults::new(PathBuf::from("runs/mask3"));
        assert_eq!(saver.video_path("in/clip.mov"), PathBuf::from("runs/mask3/clip.mp4"));
        assert_eq!(saver.video_path(""), PathBuf::from("runs/mask3/video.mp4"));
    }

    #[test]
    fn test_report_json_layout() {
        let json = serde_json::to_value(&outcome(false).report).unwrap();
        assert_eq!(json[0]["person"], 0);
        assert_eq!(json[0]["bbox"], serde_json::json!([0, 0, 8, 6]));
        assert_eq!(json[0]["landmarks"][0]["name"], "Left Nipple");
    }

    #[test]
    fn test_load_image_missing() {
        assert!(matches!(
            load_image("does/not/exist.jpg"),
            Err(MaskingError::InputUnavailable(_))
        ));
    }

    #[test]
    fn test_load_image_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&path).unwrap();
        let img = load_image(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(*img.get_pixel(0, 0), Rgb([1, 2, 3]));
    }
}
