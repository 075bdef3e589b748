//! textspot - streaming text detection and recognition
//!
//! Pulls frames from an image file or a directory of frames, finds oriented
//! text regions, normalizes each into an upright crop and greedily decodes
//! the recognition output into confidence-scored strings.

mod config;
mod decode;
mod detect;
mod error;
mod geometry;
mod model;
mod output;
mod pipeline;
mod recognize;
mod source;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::PipelineConfig;
use crate::decode::Alphabet;
use crate::detect::{DetectionThresholds, OnnxDetector};
use crate::output::Emitter;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::recognize::OnnxRecognizer;

/// textspot - streaming text detection and recognition pipeline
#[derive(Parser, Debug)]
#[command(name = "textspot")]
#[command(about = "Detect, normalize and recognize text in a stream of frames")]
struct Args {
    /// Input image file or directory of frames
    #[arg(short, long)]
    input: PathBuf,

    /// Configuration file (TOML); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text detection model (ONNX); omit to disable detection
    #[arg(long)]
    detection_model: Option<PathBuf>,

    /// Text recognition model (ONNX); omit to disable recognition
    #[arg(long)]
    recognition_model: Option<PathBuf>,

    /// Symbols the recognition model was trained on, in output order
    #[arg(long)]
    symbol_set: Option<String>,

    /// Pixel-classification confidence cutoff
    #[arg(long)]
    cls_threshold: Option<f32>,

    /// Pixel-linking confidence cutoff
    #[arg(long)]
    link_threshold: Option<f32>,

    /// Per-frame region budget; negative for unlimited
    #[arg(long)]
    max_regions: Option<i64>,

    /// Minimum recognition confidence; lower results count as not found
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Recognize a fixed centered box when detection is disabled
    #[arg(long)]
    central_crop: bool,

    /// Emit one machine-readable line per region on stdout
    #[arg(short, long)]
    raw: bool,

    /// Write annotated frames to this directory
    #[arg(long)]
    annotate_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let cfg = merge_config(&args)?;

    if cfg.detection.model.is_none() && cfg.recognition.model.is_none() {
        bail!("neither a detection model nor a recognition model is set");
    }

    // Alphabet conflicts are configuration errors; fail before any frame.
    let alphabet = Alphabet::from_symbol_set(&cfg.recognition.symbol_set)?;

    let detector = match &cfg.detection.model {
        Some(path) => Some(OnnxDetector::load(
            path,
            (cfg.detection.input_width, cfg.detection.input_height),
            cfg.detection.min_region_pixels,
        )?),
        None => None,
    };
    let recognizer = match &cfg.recognition.model {
        Some(path) => Some(OnnxRecognizer::load(
            path,
            (cfg.recognition.crop_width, cfg.recognition.crop_height),
            alphabet.len(),
        )?),
        None => None,
    };

    let settings = PipelineSettings {
        thresholds: DetectionThresholds {
            cls: cfg.detection.cls_threshold,
            link: cfg.detection.link_threshold,
        },
        max_regions: cfg.detection.max_regions,
        min_confidence: cfg.recognition.min_confidence,
        crop_size: (cfg.recognition.crop_width, cfg.recognition.crop_height),
        central_crop: cfg.recognition.central_crop,
        latency_decay: cfg.output.latency_decay,
    };

    let mut emitter = Emitter::new(cfg.output.raw, cfg.output.annotate_dir.clone())?;
    let mut pipeline = Pipeline::new(detector, recognizer, alphabet, settings);

    let stop = spawn_stop_flag();
    let frame_source = source::open_source(&args.input)?;
    let frames = source::spawn_reader(frame_source, stop.clone());

    info!("Pipeline starting (press CTRL+C to stop after the current frame)");
    pipeline.run(&frames, &stop, &mut emitter)?;

    // Raw mode keeps stdout machine-readable; the timing-invariant checks
    // behind the summary still run.
    let summary = pipeline.stats().summary()?;
    if !cfg.output.raw {
        for line in summary {
            println!("{line}");
        }
    }
    info!("Processed {} frames", pipeline.stats().frames());

    Ok(())
}

/// File config with CLI flags layered on top.
fn merge_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => config::load_config(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(model) = &args.detection_model {
        cfg.detection.model = Some(model.clone());
    }
    if let Some(model) = &args.recognition_model {
        cfg.recognition.model = Some(model.clone());
    }
    if let Some(symbols) = &args.symbol_set {
        cfg.recognition.symbol_set = symbols.clone();
    }
    if let Some(thr) = args.cls_threshold {
        cfg.detection.cls_threshold = thr;
    }
    if let Some(thr) = args.link_threshold {
        cfg.detection.link_threshold = thr;
    }
    if let Some(max) = args.max_regions {
        // Negative lifts the cap entirely.
        cfg.detection.max_regions = usize::try_from(max).ok();
    }
    if let Some(thr) = args.min_confidence {
        cfg.recognition.min_confidence = thr;
    }
    if args.central_crop {
        cfg.recognition.central_crop = true;
    }
    if args.raw {
        cfg.output.raw = true;
    }
    if let Some(dir) = &args.annotate_dir {
        cfg.output.annotate_dir = Some(dir.clone());
    }

    Ok(cfg)
}

/// Flag raised by CTRL+C. The pipeline checks it between frames, so the
/// unit of cancellation is "finish the current frame, then stop".
fn spawn_stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    std::thread::spawn(move || {
        let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
        else {
            return;
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            info!("Interrupt received, stopping after the current frame");
            flag.store(true, Ordering::SeqCst);
        }
    });
    stop
}
