//! Perspective-correcting crop extraction.
//!
//! The crop is computed from an affine map fixed by three of the four
//! vertices: the anchor and its two cyclic successors. The fourth vertex is
//! deliberately ignored, so a genuinely non-parallelogram quadrilateral is
//! approximated rather than perfectly rectified. Preserving this
//! simplification exactly is required for output compatibility; a full
//! 4-point perspective warp would be a distinct, separately-named behavior.

use image::{Rgb, RgbImage};

use super::Point;

/// Resample the region bounded by `points` into an upright crop of exactly
/// `target` size. The anchor vertex maps to `(0, 0)`, its successor to
/// `(tw-1, 0)` and its second successor to `(tw-1, th-1)`. Source samples
/// outside the image contribute black.
///
/// Reads the source image only, so it is safe to call concurrently on
/// independent regions of the same frame. Degenerate control points
/// (duplicates, collinear) produce a well-defined if visually meaningless
/// crop rather than an error.
pub fn normalize(
    image: &RgbImage,
    points: &[Point; 4],
    anchor: usize,
    target: (u32, u32),
) -> RgbImage {
    let (tw, th) = target;
    let mut crop = RgbImage::new(tw, th);

    let s0 = points[anchor % 4];
    let s1 = points[(anchor + 1) % 4];
    let s2 = points[(anchor + 2) % 4];

    // Destination triangle for the three control points.
    let d0 = Point::new(0.0, 0.0);
    let d1 = Point::new(tw.saturating_sub(1) as f32, 0.0);
    let d2 = Point::new(tw.saturating_sub(1) as f32, th.saturating_sub(1) as f32);

    // Invert the destination basis once; each output pixel is then expressed
    // in barycentric-style coordinates and mapped into the source triangle.
    let (ux, uy) = (d1.x - d0.x, d1.y - d0.y);
    let (vx, vy) = (d2.x - d0.x, d2.y - d0.y);
    let det = ux * vy - uy * vx;
    if det.abs() < f32::EPSILON {
        return crop;
    }

    for y in 0..th {
        for x in 0..tw {
            let (px, py) = (x as f32 - d0.x, y as f32 - d0.y);
            let alpha = (px * vy - py * vx) / det;
            let beta = (ux * py - uy * px) / det;

            let sx = s0.x + alpha * (s1.x - s0.x) + beta * (s2.x - s0.x);
            let sy = s0.y + alpha * (s1.y - s0.y) + beta * (s2.y - s0.y);

            crop.put_pixel(x, y, sample_bilinear(image, sx, sy));
        }
    }

    crop
}

/// Bilinear sample with black outside the source bounds.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    for (dx, dy, w) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        let px = fetch(image, x0 + dx, y0 + dy);
        for c in 0..3 {
            out[c] += w * px[c] as f32;
        }
    }

    Rgb([
        out[0].round().clamp(0.0, 255.0) as u8,
        out[1].round().clamp(0.0, 255.0) as u8,
        out[2].round().clamp(0.0, 255.0) as u8,
    ])
}

fn fetch(image: &RgbImage, x: i64, y: i64) -> [u8; 3] {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        [0, 0, 0]
    } else {
        image.get_pixel(x as u32, y as u32).0
    }
}
