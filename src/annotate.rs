// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Diagnostic drawing: exposure markers, face and person boxes.

use crate::exposure::Exposure;
use crate::results::{BBox, PersonReport};
use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Assets URL for downloading fonts
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Default label font.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Marker color for exposed landmarks.
pub const EXPOSED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Marker color for covered landmarks.
pub const COVERED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Face box color.
pub const FACE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
/// Person box color.
pub const PERSON_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Landmark dot color.
pub const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Check if font exists locally or download it
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy();
    let config_dir = dirs::config_dir()?.join("Ultralytics");
    let font_path = config_dir.join(font_name.as_ref());

    if font_path.exists() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&config_dir) {
        crate::warn!("Failed to create config directory: {e}");
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    crate::info!("Downloading {url} to {}", font_path.display());

    match ureq::get(&url).call() {
        Ok(response) => {
            let mut file = match File::create(&font_path) {
                Ok(f) => f,
                Err(e) => {
                    crate::warn!("Failed to create font file: {e}");
                    return None;
                }
            };

            let mut reader = response.into_body().into_reader();
            if let Err(e) = io::copy(&mut reader, &mut file) {
                crate::warn!("Failed to download font: {e}");
                let _ = fs::remove_file(&font_path);
                return None;
            }

            Some(font_path)
        }
        Err(e) => {
            crate::warn!("Failed to download font from {url}: {e}");
            None
        }
    }
}

/// Draws diagnostic overlays. Labels are skipped when no font is available.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    font_data: Option<Vec<u8>>,
}

impl Annotator {
    /// Create an annotator with the default font, downloading it if needed.
    #[must_use]
    pub fn new() -> Self {
        let font_data = check_font(DEFAULT_FONT).and_then(|path| fs::read(path).ok());
        Self { font_data }
    }

    /// Create an annotator that draws shapes only.
    #[must_use]
    pub const fn without_font() -> Self {
        Self { font_data: None }
    }

    fn label(&self, img: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, size: f32, text: &str) {
        let Some(font) = self
            .font_data
            .as_deref()
            .and_then(|data| FontRef::try_from_slice(data).ok())
        else {
            return;
        };
        #[allow(clippy::cast_possible_wrap)]
        let (w, h) = (img.width() as i32, img.height() as i32);
        if x < w && y < h {
            draw_text_mut(img, color, x.max(0), y.max(0), PxScale::from(size), &font, text);
        }
    }

    /// Whether a mark of `reach` pixels around `(x, y)` touches the frame.
    fn touches_frame(img: &RgbImage, x: i32, y: i32, reach: i32) -> bool {
        let (x, y, reach) = (i64::from(x), i64::from(y), i64::from(reach));
        x + reach >= 0
            && y + reach >= 0
            && x - reach < i64::from(img.width())
            && y - reach < i64::from(img.height())
    }

    /// Draw a box with a fixed 2px outline; boxes off the frame are skipped.
    #[allow(clippy::cast_sign_loss)]
    fn rect(img: &mut RgbImage, bbox: BBox, color: Rgb<u8>) {
        let b = bbox.clamp_to(img.width(), img.height());
        for t in 0..2 {
            let (x1, y1, x2, y2) = (b.x1 + t, b.y1 + t, b.x2 - t, b.y2 - t);
            if x2 > x1 && y2 > y1 {
                let rect = Rect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32);
                draw_hollow_rect_mut(img, rect, color);
            }
        }
    }

    /// Draw a circle of `radius` and an "exposed"/"covered" label for every
    /// reported landmark.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn draw_exposure(&self, frame: &RgbImage, reports: &[PersonReport], radius: u32) -> RgbImage {
        let mut img = frame.clone();
        let r = radius as i32;
        for entry in reports.iter().flat_map(|p| &p.landmarks) {
            if !Self::touches_frame(&img, entry.x, entry.y, r) {
                continue;
            }
            let color = match entry.exposure {
                Exposure::Exposed => EXPOSED_COLOR,
                Exposure::Covered => COVERED_COLOR,
            };
            draw_hollow_circle_mut(&mut img, (entry.x, entry.y), r, color);
            if r > 1 {
                draw_hollow_circle_mut(&mut img, (entry.x, entry.y), r - 1, color);
            }
            self.label(
                &mut img,
                color,
                entry.x.saturating_sub(10),
                entry.y.saturating_sub(r.saturating_add(15)),
                14.0,
                entry.exposure.as_str(),
            );
        }
        img
    }

    /// Draw face boxes, person boxes and landmark dots with their names.
    #[must_use]
    pub fn draw_boxes(&self, frame: &RgbImage, faces: &[BBox], persons: &[PersonReport]) -> RgbImage {
        let mut img = frame.clone();

        for face in faces {
            Self::rect(&mut img, *face, FACE_COLOR);
            self.label(&mut img, FACE_COLOR, face.x1, face.y1.saturating_sub(24).max(0), 18.0, "Face BBox");
        }

        for person in persons {
            let b = person.bbox;
            Self::rect(&mut img, b, PERSON_COLOR);
            let text = format!("Person {} BBox", person.person);
            self.label(&mut img, PERSON_COLOR, b.x1, b.y1.saturating_sub(24).max(0), 18.0, &text);

            for lm in &person.landmarks {
                if !Self::touches_frame(&img, lm.x, lm.y, 3) {
                    continue;
                }
                draw_filled_circle_mut(&mut img, (lm.x, lm.y), 3, LANDMARK_COLOR);
                self.label(&mut img, LANDMARK_COLOR, lm.x.saturating_add(5), lm.y.saturating_sub(17), 14.0, &lm.name);
            }
        }
        img
    }
}
