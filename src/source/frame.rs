//! Frame data for the pipeline.

use image::RgbImage;

/// A single frame pulled from a frame source. Frames have no identity
/// beyond their position in the sequence.
#[derive(Debug)]
pub struct Frame {
    /// Decoded pixel data
    pub image: RgbImage,
    /// Zero-based position in the sequence
    pub index: u64,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    /// Frame dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
