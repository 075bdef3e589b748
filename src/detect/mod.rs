//! Text detection
//!
//! Detection is a collaborator behind a narrow interface: frame in, oriented
//! quadrilaterals out. The bundled implementation runs a pixel-link style
//! ONNX model (2-channel pixel classification logits, 16-channel link
//! logits) and decodes the maps in [`postprocess`].

pub mod postprocess;

use anyhow::{bail, Context, Result};
use ndarray::Array3;
use ort::value::Tensor;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::geometry::OrientedRegion;
use crate::model::OnnxSession;
use crate::source::Frame;

/// Two independent confidence cutoffs; how they combine is internal to the
/// detector.
#[derive(Debug, Clone, Copy)]
pub struct DetectionThresholds {
    /// Pixel-classification cutoff
    pub cls: f32,
    /// Pixel-linking cutoff
    pub link: f32,
}

/// Detection result with per-stage elapsed time, so the caller can account
/// inference and postprocessing separately without reaching inside.
pub struct Detections {
    pub regions: Vec<OrientedRegion>,
    pub inference: Duration,
    pub postprocess: Duration,
}

/// Turns a frame into candidate text regions.
pub trait Detector {
    fn detect(&mut self, frame: &Frame, thresholds: DetectionThresholds) -> Result<Detections>;
}

/// Pixel-link text detector backed by an ONNX model.
pub struct OnnxDetector {
    session: OnnxSession,
    input_size: (u32, u32),
    min_region_pixels: usize,
}

impl OnnxDetector {
    pub fn load(model_path: &Path, input_size: (u32, u32), min_region_pixels: usize) -> Result<Self> {
        let session = OnnxSession::load(model_path)?;
        Ok(Self {
            session,
            input_size,
            min_region_pixels,
        })
    }

    /// NCHW float tensor of raw 0..255 channel values at model input size.
    fn input_tensor(&self, frame: &Frame) -> Result<Tensor<f32>> {
        let (iw, ih) = self.input_size;
        let resized = image::imageops::resize(
            &frame.image,
            iw,
            ih,
            image::imageops::FilterType::Triangle,
        );

        let size = (iw * ih) as usize;
        let raw = resized.as_raw();
        let mut data = vec![0f32; 3 * size];
        for idx in 0..size {
            data[idx] = raw[idx * 3] as f32;
            data[size + idx] = raw[idx * 3 + 1] as f32;
            data[2 * size + idx] = raw[idx * 3 + 2] as f32;
        }

        let shape = [1usize, 3, ih as usize, iw as usize];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .context("failed to create detection input tensor")
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, frame: &Frame, thresholds: DetectionThresholds) -> Result<Detections> {
        let began = Instant::now();
        let tensor = self.input_tensor(frame)?;
        let outputs = self
            .session
            .session_mut()
            .run(ort::inputs![tensor])
            .context("text detection inference failed")?;

        // The two maps are identified by channel count, not by name: names
        // vary between model exports, channel layout does not.
        let mut segm: Option<Array3<f32>> = None;
        let mut link: Option<Array3<f32>> = None;
        for (name, value) in outputs.iter() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .with_context(|| format!("failed to extract detection output '{name}'"))?;
            let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d as usize).collect();
            if dims.len() != 4 {
                continue;
            }
            let maps = Array3::from_shape_vec((dims[1], dims[2], dims[3]), data.to_vec())?;
            match dims[1] {
                2 => segm = Some(maps),
                16 => link = Some(maps),
                _ => debug!("Ignoring detection output '{name}' with {} channels", dims[1]),
            }
        }
        let (Some(segm), Some(link)) = (segm, link) else {
            bail!(
                "detection model must produce a 2-channel segmentation map and a 16-channel link map"
            );
        };
        let inference = began.elapsed();

        let began = Instant::now();
        let regions = postprocess::regions_from_maps(
            &segm,
            &link,
            frame.dimensions(),
            thresholds,
            self.min_region_pixels,
        );
        let postprocess = began.elapsed();

        debug!(
            "Detected {} regions in {:.1}ms (+{:.1}ms postprocess)",
            regions.len(),
            inference.as_secs_f64() * 1000.0,
            postprocess.as_secs_f64() * 1000.0
        );

        Ok(Detections {
            regions,
            inference,
            postprocess,
        })
    }
}
