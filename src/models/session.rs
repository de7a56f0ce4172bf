// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Shared ONNX Runtime session wrapper.

use std::path::Path;

#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::TensorRef;

use ndarray::Array4;

use crate::error::{MaskingError, Result};

/// Raw model output: flat data and shape.
pub type RawOutput = (Vec<f32>, Vec<usize>);

/// An ONNX Runtime session with a single image input.
pub struct OnnxSession {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    model_path: String,
}

impl OnnxSession {
    /// Load a model from an ONNX file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `num_threads` - Intra-op threads, `0` lets ONNX Runtime decide.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file doesn't exist or can't be loaded.
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MaskingError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        #[allow(unused_mut)]
        let mut builder = Session::builder().map_err(|e| {
            MaskingError::ModelLoadError(format!("Failed to create session builder: {e}"))
        })?;

        #[cfg(feature = "cuda")]
        {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(|e| MaskingError::ModelLoadError(format!("Failed to register CUDA EP: {e}")))?;
        }

        #[cfg(feature = "coreml")]
        {
            builder = builder
                .with_execution_providers([CoreMLExecutionProvider::default()
                    .with_subgraphs(true)
                    .build()])
                .map_err(|e| MaskingError::ModelLoadError(format!("Failed to register CoreML EP: {e}")))?;
        }

        let session = builder
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| {
                MaskingError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(num_threads)
            .map_err(|e| {
                MaskingError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| MaskingError::ModelLoadError(format!("Failed to load model: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| MaskingError::ModelLoadError("Model has no inputs".to_string()))?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(MaskingError::ModelLoadError("Model has no outputs".to_string()));
        }

        Ok(Self {
            session,
            input_name,
            output_names,
            model_path: path.display().to_string(),
        })
    }

    /// Run the model and return every output in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or an output is not an f32 tensor.
    pub fn run(&mut self, input: &Array4<f32>) -> Result<Vec<RawOutput>> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            MaskingError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![&self.input_name => input_tensor];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| MaskingError::InferenceError(format!("Inference failed: {e}")))?;

        let mut raw = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let output = outputs
                .get(name.as_str())
                .ok_or_else(|| MaskingError::InferenceError(format!("Output '{name}' not found")))?;
            let (shape, data) = output.try_extract_tensor::<f32>().map_err(|e| {
                MaskingError::InferenceError(format!("Failed to extract output '{name}': {e}"))
            })?;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let shape_vec: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            raw.push((data.to_vec(), shape_vec));
        }
        Ok(raw)
    }

    /// Path the model was loaded from.
    #[must_use]
    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .finish_non_exhaustive()
    }
}
