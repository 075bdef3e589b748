//! Result emission
//!
//! Two consumers: a machine-readable line per region on stdout (raw mode),
//! and annotated copies of each frame written as PNGs for a human. Either
//! or both can be active.

use anyhow::{Context, Result};
use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;
use std::path::PathBuf;
use tracing::info;

use crate::geometry::Point;
use crate::source::Frame;

/// Region outline color, detected regions.
const OUTLINE: Rgb<u8> = Rgb([50, 205, 50]);
/// Region outline color, synthesized (detection-disabled) regions.
const OUTLINE_SYNTHESIZED: Rgb<u8> = Rgb([255, 0, 0]);

/// One region's contribution to the annotated frame.
#[derive(Debug, Clone)]
pub struct RegionAnnotation {
    pub points: [Point; 4],
    pub label: Option<String>,
    pub anchor: usize,
    pub synthesized: bool,
}

/// Format one raw output line: comma-separated integer coordinates clipped
/// to the frame, then `,text` when recognition is enabled (even if the
/// gated text is empty).
pub fn format_raw_line(points: &[Point; 4], dims: (u32, u32), text: Option<&str>) -> String {
    let (w, h) = dims;
    let mut line = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&format!(
            "{},{}",
            clip(p.x as i32, w as i32 - 1),
            clip(p.y as i32, h as i32 - 1)
        ));
    }
    if let Some(text) = text {
        line.push(',');
        line.push_str(text);
    }
    line
}

fn clip(v: i32, max: i32) -> i32 {
    v.clamp(0, max.max(0))
}

/// Sink for per-region records and per-frame annotations.
pub struct Emitter {
    raw: bool,
    annotate_dir: Option<PathBuf>,
}

impl Emitter {
    pub fn new(raw: bool, annotate_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &annotate_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create annotation directory {:?}", dir))?;
        }
        Ok(Self { raw, annotate_dir })
    }

    /// Emit one region's structured record, in region-processing order.
    pub fn emit_region(&mut self, frame: &Frame, points: &[Point; 4], text: Option<&str>) {
        if self.raw {
            println!("{}", format_raw_line(points, frame.dimensions(), text));
        }
    }

    /// Close out a frame: write the annotated copy and log the overlay line.
    pub fn finish_frame(
        &mut self,
        frame: &Frame,
        annotations: &[RegionAnnotation],
        fps: Option<u32>,
        found: usize,
    ) -> Result<()> {
        if !self.raw {
            info!(
                "frame {}: fps: {} found: {}",
                frame.index,
                fps.map(|f| f.to_string()).unwrap_or_else(|| "-".into()),
                found
            );
            for a in annotations {
                if let Some(label) = &a.label {
                    let p = a.points[a.anchor];
                    info!("frame {}: '{}' at ({:.0}, {:.0})", frame.index, label, p.x, p.y);
                }
            }
        }

        let Some(dir) = &self.annotate_dir else {
            return Ok(());
        };

        let mut canvas = frame.image.clone();
        for a in annotations {
            let color = if a.synthesized {
                OUTLINE_SYNTHESIZED
            } else {
                OUTLINE
            };
            for i in 0..4 {
                let from = a.points[i];
                let to = a.points[(i + 1) % 4];
                draw_line_segment_mut(&mut canvas, (from.x, from.y), (to.x, to.y), color);
            }
        }

        let path = dir.join(format!("frame_{:06}.png", frame.index));
        canvas
            .save(&path)
            .with_context(|| format!("failed to write annotated frame {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn quad() -> [Point; 4] {
        [
            Point::new(1.2, 2.8),
            Point::new(9.0, 2.0),
            Point::new(9.0, 7.0),
            Point::new(1.0, 7.0),
        ]
    }

    #[test]
    fn raw_line_without_text() {
        let line = format_raw_line(&quad(), (20, 20), None);
        assert_eq!(line, "1,2,9,2,9,7,1,7");
    }

    #[test]
    fn raw_line_appends_text_even_when_empty() {
        assert_eq!(format_raw_line(&quad(), (20, 20), Some("hi")), "1,2,9,2,9,7,1,7,hi");
        assert_eq!(format_raw_line(&quad(), (20, 20), Some("")), "1,2,9,2,9,7,1,7,");
    }

    #[test]
    fn raw_line_clips_to_frame_bounds() {
        let points = [
            Point::new(-5.0, -3.0),
            Point::new(50.0, 1.0),
            Point::new(50.0, 50.0),
            Point::new(-5.0, 50.0),
        ];
        let line = format_raw_line(&points, (10, 8), None);
        assert_eq!(line, "0,0,9,1,9,7,0,7");
    }

    #[test]
    fn annotated_frame_is_written_with_outline() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = Emitter::new(false, Some(dir.path().to_path_buf())).unwrap();

        let frame = Frame::new(RgbImage::new(16, 16), 3);
        let annotation = RegionAnnotation {
            points: [
                Point::new(2.0, 2.0),
                Point::new(12.0, 2.0),
                Point::new(12.0, 10.0),
                Point::new(2.0, 10.0),
            ],
            label: Some("ab".into()),
            anchor: 0,
            synthesized: false,
        };
        emitter
            .finish_frame(&frame, &[annotation], Some(30), 1)
            .unwrap();

        let path = dir.path().join("frame_000003.png");
        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(6, 2).0, [50, 205, 50]);
        assert_eq!(written.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
