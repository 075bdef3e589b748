//! Frame orchestration
//!
//! Drives the per-frame control flow: detect (optional), cap, then per
//! region anchor, crop, recognize (optional), decode, gate, emit; finally
//! fold the frame latency into the running stats. Frames are strictly
//! sequential; the next frame is not pulled until the current one is fully
//! emitted.

pub mod stats;

use anyhow::Result;
use crossbeam_channel::Receiver;
use image::RgbImage;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::decode::{ctc_greedy_decode, Alphabet};
use crate::detect::{DetectionThresholds, Detector};
use crate::geometry::{select_anchor, warp, OrientedRegion};
use crate::output::{Emitter, RegionAnnotation};
use crate::recognize::Recognizer;
use crate::source::Frame;

pub use stats::RunningStats;

/// Cap the candidate list at `max_regions`, keeping the largest areas.
/// The sort is stable, so equal areas keep their original order. `None`
/// means no budget.
pub fn cap_regions(
    mut regions: Vec<OrientedRegion>,
    max_regions: Option<usize>,
) -> Vec<OrientedRegion> {
    if let Some(max) = max_regions {
        if regions.len() > max {
            regions.sort_by(|a, b| {
                b.area()
                    .partial_cmp(&a.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            regions.truncate(max);
        }
    }
    regions
}

/// The region recognized when detection is disabled: the whole frame, or a
/// fixed centered box (5% of frame width, half as tall) in center-crop
/// mode.
pub fn default_region(dims: (u32, u32), central_crop: bool) -> OrientedRegion {
    let (w, h) = dims;
    if central_crop {
        let (x, y, bw, bh) = center_box(dims);
        OrientedRegion::axis_aligned(x as f32, y as f32, bw as f32, bh as f32)
    } else {
        OrientedRegion::axis_aligned(0.0, 0.0, w.saturating_sub(1) as f32, h.saturating_sub(1) as f32)
    }
}

fn center_box(dims: (u32, u32)) -> (u32, u32, u32, u32) {
    let (w, h) = dims;
    let bw = ((w as f32 * 0.05) as u32).max(1);
    let bh = ((bw as f32 * 0.5) as u32).max(1);
    let x = (w as f32 * 0.5 - bw as f32 * 0.5) as u32;
    let y = (h as f32 * 0.5 - bh as f32 * 0.5) as u32;
    (x, y, bw, bh)
}

/// Per-frame orchestration settings, fixed for the run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub thresholds: DetectionThresholds,
    pub max_regions: Option<usize>,
    pub min_confidence: f64,
    pub crop_size: (u32, u32),
    pub central_crop: bool,
    pub latency_decay: f64,
}

/// What one frame produced.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    /// Regions that survived the cap
    pub regions: usize,
    /// Regions counted as found (all of them with recognition disabled)
    pub found: usize,
}

/// The frame-sequential orchestrator. Stage capability is decided once at
/// construction: an absent detector or recognizer disables that stage for
/// the whole run.
pub struct Pipeline<D: Detector, R: Recognizer> {
    detector: Option<D>,
    recognizer: Option<R>,
    alphabet: Alphabet,
    settings: PipelineSettings,
    stats: RunningStats,
}

impl<D: Detector, R: Recognizer> Pipeline<D, R> {
    pub fn new(
        detector: Option<D>,
        recognizer: Option<R>,
        alphabet: Alphabet,
        settings: PipelineSettings,
    ) -> Self {
        let stats = RunningStats::new(settings.latency_decay);
        Self {
            detector,
            recognizer,
            alphabet,
            settings,
            stats,
        }
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Consume frames until the source is exhausted or the stop flag is
    /// raised. The stop flag is honored between frames: the current frame
    /// always finishes. Both endings are normal termination.
    pub fn run(
        &mut self,
        frames: &Receiver<Result<Frame>>,
        stop: &AtomicBool,
        emitter: &mut Emitter,
    ) -> Result<()> {
        loop {
            if stop.load(Ordering::SeqCst) {
                info!("Stop signal received, finishing run");
                break;
            }
            match frames.recv() {
                Ok(Ok(frame)) => {
                    let report = self.process_frame(&frame, emitter)?;
                    debug!(
                        "frame {}: {} regions, {} found",
                        frame.index, report.regions, report.found
                    );
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            }
        }
        Ok(())
    }

    /// Run one frame through the full pipeline.
    pub fn process_frame(&mut self, frame: &Frame, emitter: &mut Emitter) -> Result<FrameReport> {
        let frame_began = Instant::now();
        let detection_enabled = self.detector.is_some();
        // The recognizer knows its own input size; the configured crop size
        // only applies when there is no recognizer to ask.
        let crop_size = match &self.recognizer {
            Some(recognizer) => recognizer.input_size(),
            None => self.settings.crop_size,
        };

        let regions = match &mut self.detector {
            Some(detector) => {
                let detected = detector.detect(frame, self.settings.thresholds)?;
                self.stats.detection_inference.record(detected.inference);
                self.stats
                    .detection_postprocess
                    .record(detected.postprocess);
                detected.regions
            }
            None => vec![default_region(frame.dimensions(), self.settings.central_crop)],
        };
        let regions = cap_regions(regions, self.settings.max_regions);

        let mut found = if self.recognizer.is_some() {
            0
        } else {
            regions.len()
        };
        let mut annotations = Vec::new();

        for region in &regions {
            let mut anchor = 0usize;
            let crop: Cow<'_, RgbImage> = if detection_enabled {
                let began = Instant::now();
                anchor = select_anchor(region.points());
                let crop = warp::normalize(&frame.image, region.points(), anchor, crop_size);
                self.stats.crop.record(began.elapsed());
                Cow::Owned(crop)
            } else if self.settings.central_crop {
                let (x, y, bw, bh) = center_box(frame.dimensions());
                Cow::Owned(image::imageops::crop_imm(&frame.image, x, y, bw, bh).to_image())
            } else {
                Cow::Borrowed(&frame.image)
            };

            match &mut self.recognizer {
                Some(recognizer) => {
                    let began = Instant::now();
                    let matrix = recognizer.recognize(&crop)?;
                    self.stats.recognition_inference.record(began.elapsed());

                    let began = Instant::now();
                    let decoded = ctc_greedy_decode(&matrix, &self.alphabet)?;
                    self.stats.recognition_postprocess.record(began.elapsed());

                    // Inclusive gate: a result exactly at the threshold is kept.
                    let text = if decoded.confidence >= self.settings.min_confidence {
                        decoded.text
                    } else {
                        String::new()
                    };
                    if !text.is_empty() {
                        found += 1;
                    }
                    emitter.emit_region(frame, region.points(), Some(&text));
                    if !text.is_empty() {
                        annotations.push(RegionAnnotation {
                            points: *region.points(),
                            label: Some(text),
                            anchor,
                            synthesized: !detection_enabled,
                        });
                    }
                }
                None => {
                    emitter.emit_region(frame, region.points(), None);
                    annotations.push(RegionAnnotation {
                        points: *region.points(),
                        label: None,
                        anchor,
                        synthesized: !detection_enabled,
                    });
                }
            }
        }

        self.stats.observe_frame(frame_began.elapsed());
        emitter.finish_frame(frame, &annotations, self.stats.smoothed_fps(), found)?;

        Ok(FrameReport {
            regions: regions.len(),
            found,
        })
    }
}
