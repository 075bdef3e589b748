//! Typed errors for fatal pipeline conditions.
//!
//! Everything here aborts the run: configuration mistakes are caught before
//! the first frame, timing violations at shutdown. Recoverable conditions
//! (degenerate geometry, low-confidence results) never surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured symbol set already contains the reserved pad symbol.
    #[error("symbol set must not contain the reserved pad symbol '{0}'")]
    PadSymbolInSymbolSet(char),

    /// The recognition model's output width disagrees with the alphabet.
    #[error(
        "recognition model output width {model} does not correspond to the alphabet (size {alphabet})"
    )]
    AlphabetMismatch { model: usize, alphabet: usize },

    /// A stage that ran at least once accumulated no elapsed time at all.
    /// Signals a clock-resolution or instrumentation bug, not a fast stage.
    #[error("{stage} accumulated zero elapsed time over {calls} calls")]
    ZeroStageTime { stage: &'static str, calls: u64 },
}
