//! Greedy CTC-style decoding of recognition output.
//!
//! The recognizer emits one probability row per timestep over the alphabet.
//! Decoding is a per-timestep argmax followed by collapsing consecutive
//! duplicates and dropping the reserved pad symbol. Deterministic, no
//! randomness; the only failure mode is a matrix whose alphabet dimension
//! disagrees with the configured alphabet, which is fatal.

use ndarray::Array2;

use crate::error::PipelineError;

/// Reserved "no character at this timestep" symbol, appended to every
/// alphabet. The configured symbol set must not already contain it.
pub const PAD_SYMBOL: char = '#';

/// Per-timestep scores over the alphabet: shape `[timesteps, alphabet]`.
pub type ProbabilityMatrix = Array2<f32>;

/// Ordered recognizable symbols with the pad symbol appended last.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    /// Build from the configured symbol set. A set that already contains the
    /// pad symbol is a fatal configuration error, caught at startup.
    pub fn from_symbol_set(symbol_set: &str) -> Result<Self, PipelineError> {
        if symbol_set.contains(PAD_SYMBOL) {
            return Err(PipelineError::PadSymbolInSymbolSet(PAD_SYMBOL));
        }
        let mut symbols: Vec<char> = symbol_set.chars().collect();
        symbols.push(PAD_SYMBOL);
        Ok(Self { symbols })
    }

    /// Total size including the pad symbol.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn pad_index(&self) -> usize {
        self.symbols.len() - 1
    }

    fn symbol(&self, index: usize) -> char {
        self.symbols[index]
    }
}

/// A decoded string with its aggregate confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub confidence: f64,
}

/// Greedy decode: argmax each timestep, merge consecutive runs of the same
/// symbol, drop the pad symbol. Confidence is the mean of the kept symbols'
/// top-1 scores; an empty decode reports 1.0, since an empty prediction is
/// not a low-confidence prediction.
pub fn ctc_greedy_decode(
    matrix: &ProbabilityMatrix,
    alphabet: &Alphabet,
) -> Result<Decoded, PipelineError> {
    if matrix.ncols() != alphabet.len() {
        return Err(PipelineError::AlphabetMismatch {
            model: matrix.ncols(),
            alphabet: alphabet.len(),
        });
    }

    let mut text = String::new();
    let mut kept_scores = 0.0f64;
    let mut kept = 0usize;
    let mut prev_index = alphabet.len();

    for row in matrix.rows() {
        let mut best_index = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (i, &score) in row.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best_index = i;
            }
        }

        // Collapse runs first, then drop the pad: `A A # A` decodes to "AA".
        if best_index != prev_index && best_index != alphabet.pad_index() {
            text.push(alphabet.symbol(best_index));
            kept_scores += best_score as f64;
            kept += 1;
        }
        prev_index = best_index;
    }

    let confidence = if kept == 0 {
        1.0
    } else {
        kept_scores / kept as f64
    };

    Ok(Decoded { text, confidence })
}
