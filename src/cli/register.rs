// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use image::RgbImage;

use crate::cli::args::RegisterArgs;
use crate::cli::logging::set_verbose;
use crate::gallery::{MAX_REGISTRATION_IMAGES, build_reference, save_faces};
use crate::io::load_image;
use crate::models::OnnxFaceAnalyzer;
use crate::{error, success, verbose, warn};

/// Register a reference face from a handful of photos.
pub fn run_register(args: &RegisterArgs) {
    set_verbose(args.verbose);

    if args.images.len() > MAX_REGISTRATION_IMAGES {
        warn!(
            "{} images given, only the first {MAX_REGISTRATION_IMAGES} are used",
            args.images.len()
        );
    }

    let mut images: Vec<RgbImage> = Vec::new();
    for path in args.images.iter().take(MAX_REGISTRATION_IMAGES) {
        match load_image(path) {
            Ok(img) => {
                verbose!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
                images.push(img.to_rgb8());
            }
            Err(e) => warn!("Skipping image: {e}"),
        }
    }
    if images.is_empty() {
        error!("No readable images to register");
        process::exit(1);
    }

    let mut analyzer =
        match OnnxFaceAnalyzer::load(&args.face_detector, &args.face_embedder, args.threads) {
            Ok(a) => a,
            Err(e) => {
                error!("Error loading face models: {e}");
                process::exit(1);
            }
        };

    let record = match build_reference(&mut analyzer, &images) {
        Ok(r) => r,
        Err(e) => {
            error!("Registration failed: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = save_faces(&args.output, &[record]) {
        error!("Failed to write {}: {e}", args.output.display());
        process::exit(1);
    }
    success!("Reference face saved to {}", args.output.display());
}
