//! Pixel-link map decoding.
//!
//! The detection model emits, per map pixel, a 2-channel text/background
//! logit pair and 16 link logits (8 neighbor directions, one logit pair
//! each). Decoding thresholds the text score, joins 8-connected positive
//! pixels whose connecting link also passes its threshold, and fits a
//! minimum-area rectangle around each surviving component.

use imageproc::geometry::min_area_rect;
use imageproc::point::Point as MapPoint;
use ndarray::Array3;

use super::DetectionThresholds;
use crate::geometry::{OrientedRegion, Point};

/// Neighbor offsets in link-channel order: direction `d` uses logit
/// channels `2d` and `2d + 1`.
const NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Decode score maps into oriented regions in frame coordinates.
///
/// `segm` has shape `[2, H, W]`, `link` has shape `[16, H, W]`; both are
/// raw logits. Components with fewer than `min_region_pixels` map pixels
/// are discarded.
pub fn regions_from_maps(
    segm: &Array3<f32>,
    link: &Array3<f32>,
    frame_size: (u32, u32),
    thresholds: DetectionThresholds,
    min_region_pixels: usize,
) -> Vec<OrientedRegion> {
    let (_, h, w) = segm.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    // Text mask: softmax over the logit pair reduces to a sigmoid of the
    // logit difference.
    let mut mask = vec![false; h * w];
    for y in 0..h {
        for x in 0..w {
            let score = sigmoid(segm[[1, y, x]] - segm[[0, y, x]]);
            mask[y * w + x] = score >= thresholds.cls;
        }
    }

    // Join positive pixels whose link toward the neighbor passes.
    let mut forest = UnionFind::new(h * w);
    for y in 0..h {
        for x in 0..w {
            if !mask[y * w + x] {
                continue;
            }
            for (d, (dx, dy)) in NEIGHBORS.iter().enumerate() {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if !mask[ny * w + nx] {
                    continue;
                }
                let link_score = sigmoid(link[[2 * d + 1, y, x]] - link[[2 * d, y, x]]);
                if link_score >= thresholds.link {
                    forest.union(y * w + x, ny * w + nx);
                }
            }
        }
    }

    // Gather component pixel coordinates keyed by root.
    let mut components: std::collections::HashMap<usize, Vec<MapPoint<i32>>> =
        std::collections::HashMap::new();
    for y in 0..h {
        for x in 0..w {
            if mask[y * w + x] {
                let root = forest.find(y * w + x);
                components
                    .entry(root)
                    .or_default()
                    .push(MapPoint::new(x as i32, y as i32));
            }
        }
    }

    let scale_x = frame_size.0 as f32 / w as f32;
    let scale_y = frame_size.1 as f32 / h as f32;

    let mut regions: Vec<OrientedRegion> = components
        .into_values()
        .filter(|pixels| pixels.len() >= min_region_pixels)
        .map(|pixels| {
            let corners = min_area_rect(&pixels);
            OrientedRegion::new(corners.map(|c| {
                Point::new(c.x as f32 * scale_x, c.y as f32 * scale_y)
            }))
        })
        .collect();

    // HashMap iteration order is arbitrary; keep the output deterministic.
    regions.sort_by(|a, b| {
        let (pa, pb) = (a.points()[0], b.points()[0]);
        (pa.y, pa.x)
            .partial_cmp(&(pb.y, pb.x))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    regions
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Union-find with path halving; sized once for the whole map.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    const THRESHOLDS: DetectionThresholds = DetectionThresholds {
        cls: 0.5,
        link: 0.5,
    };

    /// Build logit maps from a pixel mask; links are uniformly positive or
    /// negative.
    fn maps_from_mask(mask: &[&[u8]], links_on: bool) -> (Array3<f32>, Array3<f32>) {
        let h = mask.len();
        let w = mask[0].len();
        let mut segm = Array3::zeros((2, h, w));
        for (y, row) in mask.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                segm[[1, y, x]] = if v != 0 { 10.0 } else { -10.0 };
            }
        }
        let link_logit = if links_on { 10.0 } else { -10.0 };
        let mut link = Array3::zeros((16, h, w));
        for d in 0..8 {
            for y in 0..h {
                for x in 0..w {
                    link[[2 * d + 1, y, x]] = link_logit;
                }
            }
        }
        (segm, link)
    }

    #[test]
    fn two_separate_blobs_become_two_regions() {
        let mask: &[&[u8]] = &[
            &[1, 1, 0, 0, 0, 0],
            &[1, 1, 0, 0, 1, 1],
            &[0, 0, 0, 0, 1, 1],
        ];
        let (segm, link) = maps_from_mask(mask, true);
        let regions = regions_from_maps(&segm, &link, (6, 3), THRESHOLDS, 1);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn negative_links_split_adjacent_pixels() {
        let mask: &[&[u8]] = &[&[1, 1, 1, 1]];
        let (segm, link) = maps_from_mask(mask, false);
        let regions = regions_from_maps(&segm, &link, (4, 1), THRESHOLDS, 1);
        // Every pixel is positive but nothing joins: one region per pixel.
        assert_eq!(regions.len(), 4);
    }

    #[test]
    fn small_components_are_discarded() {
        let mask: &[&[u8]] = &[
            &[1, 0, 0, 0],
            &[0, 0, 1, 1],
            &[0, 0, 1, 1],
        ];
        let (segm, link) = maps_from_mask(mask, true);
        let regions = regions_from_maps(&segm, &link, (4, 3), THRESHOLDS, 2);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn corners_scale_to_frame_coordinates() {
        let mask: &[&[u8]] = &[
            &[0, 0, 0, 0],
            &[0, 1, 1, 0],
            &[0, 1, 1, 0],
            &[0, 0, 0, 0],
        ];
        let (segm, link) = maps_from_mask(mask, true);
        // Frame is 4x the 4x4 map in each dimension.
        let regions = regions_from_maps(&segm, &link, (16, 16), THRESHOLDS, 1);
        assert_eq!(regions.len(), 1);
        for p in regions[0].points() {
            assert!(p.x >= 4.0 && p.x <= 8.0, "x out of range: {}", p.x);
            assert!(p.y >= 4.0 && p.y <= 8.0, "y out of range: {}", p.y);
        }
    }

    #[test]
    fn empty_mask_yields_no_regions() {
        let mask: &[&[u8]] = &[&[0, 0], &[0, 0]];
        let (segm, link) = maps_from_mask(mask, true);
        assert!(regions_from_maps(&segm, &link, (2, 2), THRESHOLDS, 1).is_empty());
    }
}
