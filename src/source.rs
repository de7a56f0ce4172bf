// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input sources for masking jobs.
//!
//! A source is a single image, an in-memory image, a list of images, a
//! directory, a simple glob pattern or a video file. Video frames are decoded
//! with `video-rs` when the `video` feature is enabled.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{MaskingError, Result};
use crate::io::load_image;

/// Video file extensions recognized when parsing a path.
const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
];

/// Image file extensions collected from directories.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// Represents different input sources.
#[derive(Debug, Clone)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// In-memory image.
    ImageBuffer(DynamicImage),
    /// List of image paths.
    ImageList(Vec<PathBuf>),
    /// Path to a video file.
    Video(PathBuf),
    /// Directory containing images.
    Directory(PathBuf),
    /// Glob pattern for images.
    Glob(String),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_) | Self::ImageBuffer(_))
    }

    /// Check if this source is a video.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    /// Check if this source is a directory, glob pattern or list.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(
            self,
            Self::Directory(_) | Self::Glob(_) | Self::ImageList(_)
        )
    }

    /// Get the path if this source has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Image(p) | Self::Video(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            return Self::Directory(path);
        }

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                return Self::Video(path);
            }
        }

        Self::Image(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<DynamicImage> for Source {
    fn from(img: DynamicImage) -> Self {
        Self::ImageBuffer(img)
    }
}

/// Metadata about a source frame.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Frame index (0 for single images).
    pub frame_idx: usize,
    /// Total frames, when known.
    pub total_frames: Option<usize>,
    /// Source path or identifier.
    pub path: String,
    /// Frames per second (for video sources).
    pub fps: Option<f32>,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            frame_idx: 0,
            total_frames: Some(1),
            path: String::new(),
            fps: None,
        }
    }
}

/// Iterator over frames from a source.
pub struct SourceIterator {
    source: Source,
    current_frame: usize,
    image_paths: Vec<PathBuf>,
    #[cfg(feature = "video")]
    decoder: Option<video_rs::decode::Decoder>,
    #[cfg(feature = "video")]
    total_frames: Option<usize>,
    #[cfg(feature = "video")]
    finished: bool,
}

impl std::fmt::Debug for SourceIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceIterator")
            .field("source", &self.source.path())
            .field("current_frame", &self.current_frame)
            .field("images", &self.image_paths.len())
            .finish_non_exhaustive()
    }
}

impl SourceIterator {
    /// Create a new source iterator.
    ///
    /// # Errors
    ///
    /// Returns `InputUnavailable` if a directory or glob base cannot be read.
    pub fn new(source: Source) -> Result<Self> {
        let image_paths = match &source {
            Source::Directory(path) => Self::collect_images_from_dir(path)?,
            Source::Glob(pattern) => Self::collect_images_from_glob(pattern)?,
            Source::Image(path) => vec![path.clone()],
            Source::ImageList(paths) => paths.clone(),
            Source::ImageBuffer(_) | Source::Video(_) => vec![],
        };

        Ok(Self {
            source,
            current_frame: 0,
            image_paths,
            #[cfg(feature = "video")]
            decoder: None,
            #[cfg(feature = "video")]
            total_frames: None,
            #[cfg(feature = "video")]
            finished: false,
        })
    }

    /// Source being iterated.
    #[must_use]
    pub const fn source(&self) -> &Source {
        &self.source
    }

    fn read_dir_filtered(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(MaskingError::InputUnavailable(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| keep(path))
            .collect();

        paths.sort();
        Ok(paths)
    }

    /// Collect image paths from a directory.
    fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        Self::read_dir_filtered(dir, is_image_file)
    }

    /// Collect image paths from a pattern like `dir/*.jpg`.
    fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
        let Some(star_pos) = pattern.find('*') else {
            return Ok(vec![PathBuf::from(pattern)]);
        };

        let dir_part = &pattern[..star_pos];
        let dir = if dir_part.is_empty() {
            Path::new(".")
        } else {
            Path::new(dir_part.trim_end_matches('/').trim_end_matches('\\'))
        };

        let ext_filter: Option<String> = pattern[star_pos..]
            .strip_prefix("*.")
            .map(str::to_lowercase);

        Self::read_dir_filtered(dir, |path| {
            ext_filter.as_ref().map_or_else(
                || is_image_file(path),
                |ext| {
                    path.extension()
                        .is_some_and(|e| e.to_string_lossy().to_lowercase() == *ext)
                },
            )
        })
    }

    /// Get the next image from the list.
    fn next_image(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        let path = self.image_paths.get(self.current_frame)?;
        let meta = SourceMeta {
            frame_idx: self.current_frame,
            total_frames: Some(self.image_paths.len()),
            path: path.to_string_lossy().to_string(),
            fps: None,
        };

        self.current_frame += 1;
        Some(load_image(path).map(|img| (img, meta)))
    }

    /// Get the next video frame.
    #[cfg(feature = "video")]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        if self.finished {
            return None;
        }

        if self.decoder.is_none()
            && let Source::Video(path) = &self.source
        {
            crate::io::init_logging();
            match video_rs::decode::Decoder::new(path.as_path()) {
                Ok(d) => {
                    if let Ok(duration) = d.duration() {
                        let fps = d.frame_rate();
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            self.total_frames =
                                Some((duration.as_secs_f64() * f64::from(fps)) as usize);
                        }
                    }
                    self.decoder = Some(d);
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(MaskingError::InputUnavailable(format!(
                        "Failed to open video {}: {e}",
                        path.display()
                    ))));
                }
            }
        }

        let decoder = self.decoder.as_mut()?;
        match decoder.decode() {
            Ok((_ts, frame)) => {
                let meta = SourceMeta {
                    frame_idx: self.current_frame,
                    total_frames: self.total_frames,
                    path: self
                        .source
                        .path()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    fps: Some(decoder.frame_rate()),
                };
                self.current_frame += 1;

                Some(crate::utils::array_to_image(&frame).map(|img| (DynamicImage::ImageRgb8(img), meta)))
            }
            Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(MaskingError::VideoError(format!(
                    "Failed to decode frame {}: {e}",
                    self.current_frame
                ))))
            }
        }
    }

    #[cfg(not(feature = "video"))]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, SourceMeta)>> {
        if self.current_frame > 0 {
            return None;
        }
        self.current_frame = 1;
        Some(Err(MaskingError::FeatureNotEnabled(
            "Video support requires 'video' feature".to_string(),
        )))
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        match &self.source {
            Source::Image(_) | Source::Directory(_) | Source::Glob(_) | Source::ImageList(_) => {
                self.next_image()
            }
            Source::ImageBuffer(img) => {
                if self.current_frame == 0 {
                    self.current_frame = 1;
                    Some(Ok((img.clone(), SourceMeta::default())))
                } else {
                    None
                }
            }
            Source::Video(_) => self.next_video_frame(),
        }
    }
}

/// Check if a path is an image file based on extension.
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_source_from_string() {
        assert!(matches!(Source::from("image.jpg"), Source::Image(_)));
        assert!(matches!(Source::from("video.mp4"), Source::Video(_)));
        assert!(matches!(Source::from("clip.MOV"), Source::Video(_)));
        assert!(matches!(Source::from("*.jpg"), Source::Glob(_)));
    }

    #[test]
    fn test_source_checks() {
        let img = Source::Image(PathBuf::from("test.jpg"));
        assert!(img.is_image());
        assert!(!img.is_video());

        let vid = Source::Video(PathBuf::from("test.mp4"));
        assert!(!vid.is_image());
        assert!(vid.is_video());

        let dir = Source::Directory(PathBuf::from("./images"));
        assert!(dir.is_batch());
        assert_eq!(dir.path(), Some(Path::new("./images")));
    }

    #[test]
    fn test_directory_yields_sorted_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png"] {
            RgbImage::from_pixel(2, 2, Rgb([9, 9, 9]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let frames: Vec<_> = SourceIterator::new(Source::from(dir.path()))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].1.path.ends_with("a.png"));
        assert_eq!(frames[1].1.frame_idx, 1);
        assert_eq!(frames[1].1.total_frames, Some(2));
    }

    #[test]
    fn test_glob_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(1, 1).save(dir.path().join("x.png")).unwrap();
        RgbImage::new(1, 1).save(dir.path().join("y.bmp")).unwrap();

        let pattern = format!("{}/*.png", dir.path().display());
        let frames: Vec<_> = SourceIterator::new(Source::from(pattern.as_str()))
            .unwrap()
            .collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_unreadable_image_is_input_unavailable() {
        let mut iter = SourceIterator::new(Source::Image(PathBuf::from("missing.png"))).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(MaskingError::InputUnavailable(_)))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_image_buffer_yields_once() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 3));
        let mut iter = SourceIterator::new(Source::from(img)).unwrap();
        let (frame, meta) = iter.next().unwrap().unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(meta.frame_idx, 0);
        assert!(iter.next().is_none());
    }
}
