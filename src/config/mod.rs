//! Pipeline Configuration
//!
//! Tunables stored in TOML format; command-line flags override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Detection settings
    pub detection: DetectionSettings,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Output settings
    pub output: OutputSettings,
}

/// Text-detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Detection model path, or None to disable detection
    pub model: Option<PathBuf>,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Pixel-classification confidence cutoff (0.0 - 1.0)
    pub cls_threshold: f32,
    /// Pixel-linking confidence cutoff (0.0 - 1.0)
    pub link_threshold: f32,
    /// Per-frame region budget, or None for unlimited
    pub max_regions: Option<usize>,
    /// Components smaller than this many map pixels are discarded
    pub min_region_pixels: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model: None,
            input_width: 1280,
            input_height: 768,
            cls_threshold: 0.8,
            link_threshold: 0.8,
            max_regions: None,
            min_region_pixels: 6,
        }
    }
}

/// Text-recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Recognition model path, or None to disable recognition
    pub model: Option<PathBuf>,
    /// Recognizable symbols, in model output order (pad symbol excluded)
    pub symbol_set: String,
    /// Normalized crop width fed to the recognizer
    pub crop_width: u32,
    /// Normalized crop height fed to the recognizer
    pub crop_height: u32,
    /// Minimum decode confidence; results below it count as not found
    pub min_confidence: f64,
    /// With detection disabled, recognize a fixed centered box instead of
    /// the whole frame
    pub central_crop: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            model: None,
            symbol_set: "0123456789abcdefghijklmnopqrstuvwxyz".to_string(),
            crop_width: 120,
            crop_height: 32,
            min_confidence: 0.2,
            central_crop: false,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Emit one machine-readable line per region on stdout and suppress the
    /// run-end summary
    pub raw: bool,
    /// Directory for annotated frames, or None to skip annotation
    pub annotate_dir: Option<PathBuf>,
    /// Exponential-smoothing decay for the frame latency estimate
    pub latency_decay: f64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            raw: false,
            annotate_dir: None,
            latency_decay: 0.8,
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.detection.cls_threshold, 0.8);
        assert_eq!(config.detection.link_threshold, 0.8);
        assert_eq!(config.detection.max_regions, None);
        assert_eq!(config.recognition.min_confidence, 0.2);
        assert_eq!(config.recognition.crop_width, 120);
        assert_eq!(config.recognition.crop_height, 32);
        assert_eq!(config.output.latency_decay, 0.8);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[detection]\ncls_threshold = 0.5\n\n[recognition]\nsymbol_set = \"abc\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.detection.cls_threshold, 0.5);
        assert_eq!(config.detection.link_threshold, 0.8);
        assert_eq!(config.recognition.symbol_set, "abc");
    }
}
