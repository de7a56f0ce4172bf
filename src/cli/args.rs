// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::identity::SimilarityMetric;
use crate::models::ModelPaths;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    exposure-mask register --images a.jpg b.jpg c.jpg --output reference.json
    exposure-mask mask --source photo.jpg --reference reference.json
    exposure-mask mask --source photos/ --no-diagnostics
    exposure-mask mask --source clip.mp4 --reference reference.json --metric euclidean"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Blur exposed regions of the matched person in an image, folder or video
    Mask(MaskArgs),
    /// Build a reference face file from a few photos of one person
    Register(RegisterArgs),
}

/// ONNX model locations.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Person detection model (YOLO, COCO classes)
    #[arg(long, default_value = "yolo11n.onnx")]
    pub detector: PathBuf,

    /// Pose landmark model
    #[arg(long, default_value = "pose_landmark.onnx")]
    pub pose: PathBuf,

    /// Person segmentation model
    #[arg(long, default_value = "person_segmentation.onnx")]
    pub segmenter: PathBuf,

    /// Face detection model (single-class YOLO)
    #[arg(long, default_value = "yolo11n-face.onnx")]
    pub face_detector: PathBuf,

    /// Face embedding model (112x112 input)
    #[arg(long, default_value = "arcface.onnx")]
    pub face_embedder: PathBuf,
}

impl From<&ModelArgs> for ModelPaths {
    fn from(args: &ModelArgs) -> Self {
        Self {
            detector: args.detector.clone(),
            pose: args.pose.clone(),
            segmenter: args.segmenter.clone(),
            face_detector: args.face_detector.clone(),
            face_embedder: args.face_embedder.clone(),
        }
    }
}

/// Arguments for the mask command.
#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Input source (image, directory, glob or video)
    #[arg(short, long)]
    pub source: String,

    /// Reference face file written by `register`; without it any face selects its person
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    #[command(flatten)]
    /// Model paths.
    pub models: ModelArgs,

    /// Person detection confidence threshold
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Radius of the sampled disk around each landmark
    #[arg(long, default_value_t = 20)]
    pub radius: u32,

    /// Skin fraction at which a landmark counts as exposed
    #[arg(long, default_value_t = 0.5)]
    pub exposure_threshold: f32,

    /// Wrist distance, in multiples of the radius, that forces "covered"
    #[arg(long, default_value_t = 1.5)]
    pub wrist_factor: f32,

    /// Horizontal padding around masked regions
    #[arg(long, default_value_t = 50)]
    pub margin_x: i32,

    /// Vertical padding around masked regions
    #[arg(long, default_value_t = 30)]
    pub margin_y: i32,

    /// Headroom above the nipples for the upper region
    #[arg(long, default_value_t = 80)]
    pub top_extension: i32,

    /// Gaussian kernel size used for masking
    #[arg(long, default_value_t = 151)]
    pub blur_kernel: u32,

    /// Number of blur passes
    #[arg(long, default_value_t = 5)]
    pub blur_iterations: u32,

    /// Face similarity metric (cosine or euclidean)
    #[arg(long, default_value = "cosine")]
    pub metric: SimilarityMetric,

    /// Face match threshold [default: 0.5 cosine, 0.65 euclidean]
    #[arg(long)]
    pub match_threshold: Option<f32>,

    /// Skip the exposure and box diagnostic images
    #[arg(long, default_value_t = false)]
    pub no_diagnostics: bool,

    /// ONNX Runtime intra-op threads (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Parent directory of the run folders
    #[arg(long, default_value = "runs")]
    pub project: String,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the register command.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Photos of the person (at most 5 are used)
    #[arg(short, long, num_args = 1.., required = true)]
    pub images: Vec<PathBuf>,

    /// Output face file
    #[arg(short, long, default_value = "reference.json")]
    pub output: PathBuf,

    /// Face detection model (single-class YOLO)
    #[arg(long, default_value = "yolo11n-face.onnx")]
    pub face_detector: PathBuf,

    /// Face embedding model (112x112 input)
    #[arg(long, default_value = "arcface.onnx")]
    pub face_embedder: PathBuf,

    /// ONNX Runtime intra-op threads (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
