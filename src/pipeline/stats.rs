//! Running performance statistics.
//!
//! One accumulator value owned by the orchestrator, updated once per frame
//! or region and read once at shutdown. No ambient globals, so the
//! orchestrator stays testable.

use std::time::Duration;

use crate::error::PipelineError;

/// Cumulative (time, count) pair for one pipeline stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageStats {
    total: Duration,
    calls: u64,
}

impl StageStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.calls += 1;
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn average_ms(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total.as_secs_f64() * 1000.0 / self.calls as f64
    }

    pub fn throughput_fps(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.calls as f64 / secs
    }

    /// A stage that ran but accumulated no time at all points at a clock or
    /// instrumentation bug, never at a genuinely instantaneous stage.
    fn check_nonzero(&self, stage: &'static str) -> Result<(), PipelineError> {
        if self.calls > 0 && self.total == Duration::ZERO {
            return Err(PipelineError::ZeroStageTime {
                stage,
                calls: self.calls,
            });
        }
        Ok(())
    }
}

/// Per-run mutable counters: smoothed frame latency plus cumulative
/// per-stage timings.
#[derive(Debug)]
pub struct RunningStats {
    pub detection_inference: StageStats,
    pub detection_postprocess: StageStats,
    pub recognition_inference: StageStats,
    pub recognition_postprocess: StageStats,
    pub crop: StageStats,
    avg_frame_ms: Option<f64>,
    decay: f64,
    frames: u64,
}

impl RunningStats {
    pub fn new(decay: f64) -> Self {
        Self {
            detection_inference: StageStats::default(),
            detection_postprocess: StageStats::default(),
            recognition_inference: StageStats::default(),
            recognition_postprocess: StageStats::default(),
            crop: StageStats::default(),
            avg_frame_ms: None,
            decay,
            frames: 0,
        }
    }

    /// Fold one frame's latency into the smoothed estimate. The first frame
    /// seeds the average directly; later frames decay toward it.
    pub fn observe_frame(&mut self, elapsed: Duration) {
        let current_ms = elapsed.as_secs_f64() * 1000.0;
        self.avg_frame_ms = Some(match self.avg_frame_ms {
            None => current_ms,
            Some(avg) => avg * self.decay + (1.0 - self.decay) * current_ms,
        });
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Smoothed frames-per-second, once at least one frame was observed.
    pub fn smoothed_fps(&self) -> Option<u32> {
        self.avg_frame_ms
            .filter(|&ms| ms > 0.0)
            .map(|ms| (1000.0 / ms) as u32)
    }

    /// Run-end summary lines, one per stage that ran. Postprocessing and
    /// crop stages with a zero accumulated time after at least one call are
    /// a fatal invariant violation.
    pub fn summary(&self) -> Result<Vec<String>, PipelineError> {
        let mut lines = Vec::new();

        if self.detection_inference.calls() > 0 {
            lines.push(summary_line(
                "text detection model inference",
                &self.detection_inference,
            ));
            self.detection_postprocess
                .check_nonzero("text detection postprocessing")?;
            lines.push(summary_line(
                "text detection postprocessing",
                &self.detection_postprocess,
            ));
        }

        if self.recognition_inference.calls() > 0 {
            lines.push(summary_line(
                "text recognition model inference",
                &self.recognition_inference,
            ));
            self.recognition_postprocess
                .check_nonzero("text recognition postprocessing")?;
            lines.push(summary_line(
                "text recognition postprocessing",
                &self.recognition_postprocess,
            ));
        }

        if self.crop.calls() > 0 {
            self.crop.check_nonzero("text crop")?;
            lines.push(summary_line("text crop", &self.crop));
        }

        Ok(lines)
    }
}

fn summary_line(stage: &str, stats: &StageStats) -> String {
    format!(
        "{stage} (ms) (fps): {:.2} {:.1}",
        stats.average_ms(),
        stats.throughput_fps()
    )
}
