//! Text recognition
//!
//! The recognizer is a collaborator behind a narrow interface: normalized
//! crop in, per-timestep probability matrix out. The bundled implementation
//! runs a CTC-trained ONNX model on a grayscale crop. The model's alphabet
//! dimension is checked against the configured alphabet on every output;
//! a mismatch means the model and symbol set do not belong together, which
//! is fatal.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Array2;
use ort::value::Tensor;
use std::path::Path;

use crate::decode::ProbabilityMatrix;
use crate::error::PipelineError;
use crate::model::OnnxSession;

/// Turns a normalized crop into a probability matrix over the alphabet.
pub trait Recognizer {
    /// Crop size this recognizer expects from the normalizer.
    fn input_size(&self) -> (u32, u32);

    fn recognize(&mut self, crop: &RgbImage) -> Result<ProbabilityMatrix>;
}

/// CTC recognizer backed by an ONNX model.
pub struct OnnxRecognizer {
    session: OnnxSession,
    input_size: (u32, u32),
    alphabet_size: usize,
}

impl OnnxRecognizer {
    pub fn load(model_path: &Path, input_size: (u32, u32), alphabet_size: usize) -> Result<Self> {
        let session = OnnxSession::load(model_path)?;
        Ok(Self {
            session,
            input_size,
            alphabet_size,
        })
    }

    /// NCHW grayscale float tensor at the model input size. Crops that are
    /// not already at the input size (the whole-frame and center-box paths)
    /// are resized first.
    fn input_tensor(&self, crop: &RgbImage) -> Result<Tensor<f32>> {
        let (iw, ih) = self.input_size;
        let resized;
        let crop = if crop.dimensions() == (iw, ih) {
            crop
        } else {
            resized = image::imageops::resize(crop, iw, ih, image::imageops::FilterType::Triangle);
            &resized
        };

        let size = (iw * ih) as usize;
        let raw = crop.as_raw();
        let mut data = vec![0f32; size];
        for idx in 0..size {
            // Standard luminance weights.
            data[idx] = 0.299 * raw[idx * 3] as f32
                + 0.587 * raw[idx * 3 + 1] as f32
                + 0.114 * raw[idx * 3 + 2] as f32;
        }

        let shape = [1usize, 1, ih as usize, iw as usize];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .context("failed to create recognition input tensor")
    }
}

impl Recognizer for OnnxRecognizer {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn recognize(&mut self, crop: &RgbImage) -> Result<ProbabilityMatrix> {
        let tensor = self.input_tensor(crop)?;
        let outputs = self
            .session
            .session_mut()
            .run(ort::inputs![tensor])
            .context("text recognition inference failed")?;

        let (_, value) = outputs
            .iter()
            .next()
            .context("recognition model produced no outputs")?;
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract recognition output tensor")?;
        let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d as usize).collect();

        matrix_from_output(&dims, data, self.alphabet_size)
    }
}

/// Reshape the model output to `[timesteps, alphabet]`, validating the
/// alphabet dimension. Accepts `[T, A]`, `[T, 1, A]` and `[1, T, A]`
/// layouts; the alphabet is always the innermost dimension.
fn matrix_from_output(
    dims: &[usize],
    data: &[f32],
    alphabet_size: usize,
) -> Result<ProbabilityMatrix> {
    let model_width = dims.last().copied().unwrap_or(0);
    if model_width != alphabet_size {
        return Err(PipelineError::AlphabetMismatch {
            model: model_width,
            alphabet: alphabet_size,
        }
        .into());
    }

    let timesteps = data.len() / model_width.max(1);
    Array2::from_shape_vec((timesteps, model_width), data.to_vec())
        .context("recognition output has inconsistent shape")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_middle_layout_is_flattened() {
        // [T=2, batch=1, A=3]
        let data = [0.1f32, 0.2, 0.7, 0.5, 0.3, 0.2];
        let matrix = matrix_from_output(&[2, 1, 3], &data, 3).unwrap();
        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(matrix[[1, 0]], 0.5);
    }

    #[test]
    fn batch_leading_layout_is_flattened() {
        let data = [0.0f32; 12];
        let matrix = matrix_from_output(&[1, 4, 3], &data, 3).unwrap();
        assert_eq!(matrix.dim(), (4, 3));
    }

    #[test]
    fn alphabet_mismatch_is_fatal() {
        let data = [0.0f32; 10];
        let err = matrix_from_output(&[2, 5], &data, 3).unwrap_err();
        let err = err.downcast::<PipelineError>().unwrap();
        assert!(matches!(
            err,
            PipelineError::AlphabetMismatch {
                model: 5,
                alphabet: 3
            }
        ));
    }
}
