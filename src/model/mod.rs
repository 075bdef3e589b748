//! ONNX Runtime session management.

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// ONNX Runtime session wrapper shared by the detector and recognizer.
pub struct OnnxSession {
    session: Session,
}

impl OnnxSession {
    /// Load a model file into a CPU session.
    pub fn load(model_path: &Path) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ONNX model {:?}", model_path))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let output_names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self { session })
    }

    /// Get the underlying session mutably for running inference.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
