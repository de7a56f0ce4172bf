// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;
use std::process;

use crate::cli::args::MaskArgs;
use crate::cli::logging::set_verbose;
use crate::config::MaskingConfig;
use crate::error::Result;
use crate::gallery::load_faces;
use crate::io::{SaveResults, find_next_run_dir};
use crate::models::ModelPaths;
use crate::pipeline::MaskingPipeline;
use crate::results::FaceRecord;
use crate::source::Source;
use crate::{VERSION, error, info, section, success, verbose, warn};

/// Build the pipeline configuration from CLI arguments.
#[must_use]
pub fn config_from_args(args: &MaskArgs, is_video: bool) -> MaskingConfig {
    let mut config = MaskingConfig::new()
        .with_person_confidence(args.conf)
        .with_iou(args.iou)
        .with_exposure(args.radius, args.exposure_threshold)
        .with_wrist_suppression(args.wrist_factor)
        .with_margins(args.margin_x, args.margin_y)
        .with_top_extension(args.top_extension)
        .with_blur(args.blur_kernel, args.blur_iterations)
        .with_similarity(args.metric)
        .with_diagnostics(!args.no_diagnostics && !is_video)
        .with_threads(args.threads);
    if let Some(threshold) = args.match_threshold {
        config = config.with_match_threshold(threshold);
    }
    config
}

fn load_reference(args: &MaskArgs) -> Vec<FaceRecord> {
    let Some(path) = &args.reference else {
        warn!("'reference' argument is missing. Any detected face selects its person.");
        return Vec::new();
    };
    match load_faces(path) {
        Ok(faces) if faces.is_empty() => {
            warn!("Reference file {} holds no faces", path.display());
            faces
        }
        Ok(faces) => faces,
        Err(e) => {
            error!("Error loading reference: {e}");
            process::exit(1);
        }
    }
}

/// Run the masking job.
pub fn run_mask(args: &MaskArgs) {
    set_verbose(args.verbose);

    let source = Source::from(args.source.as_str());
    let is_video = source.is_video();
    #[cfg(not(feature = "video"))]
    if is_video {
        warn!(
            "Video source detected but 'video' feature is not enabled. Please compile with '--features video'"
        );
        process::exit(1);
    }

    let config = config_from_args(args, is_video);
    let reference = load_reference(args);

    println!("Exposure Mask {VERSION} 🚀 Rust ONNX");
    let caps = match ModelPaths::from(&args.models).load(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("Error loading models: {e}");
            process::exit(1);
        }
    };
    verbose!(
        "similarity={} threshold={:.2} radius={} blur={}x{}",
        config.similarity,
        config.effective_match_threshold(),
        config.exposure_radius,
        config.blur_kernel,
        config.blur_iterations
    );

    let save_dir = PathBuf::from(find_next_run_dir(&args.project, "mask"));
    let saver = SaveResults::new(save_dir.clone());
    let mut pipeline = MaskingPipeline::new(caps, config);

    #[cfg(feature = "video")]
    let result = if is_video {
        let output = saver.video_path(&args.source);
        section!("video {} -> {}", args.source, output.display());
        pipeline.process_video(&args.source, &output, &reference)
    } else {
        mask_images(&mut pipeline, source, &reference, &saver)
    };
    #[cfg(not(feature = "video"))]
    let result = mask_images(&mut pipeline, source, &reference, &saver);

    match result {
        Ok(count) => {
            success!("{count} frame(s) processed, results saved to {}", save_dir.display());
        }
        Err(e) => {
            error!("Masking failed: {e}");
            process::exit(1);
        }
    }
}

/// Mask every image of a source and save its artifacts.
fn mask_images(
    pipeline: &mut MaskingPipeline,
    source: Source,
    reference: &[FaceRecord],
    saver: &SaveResults,
) -> Result<usize> {
    pipeline.process_source(source, reference, |meta, outcome| {
        let total = meta
            .total_frames
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        section!("image {}/{} {}", meta.frame_idx + 1, total, meta.path);
        for message in outcome.verdict.messages() {
            info!("{message}");
        }
        saver.save(meta, outcome)
    })
}
