use foundation::math::Vec2;
use foundation::math::precision::stable_total_cmp_f64;

use crate::dataset::HotspotSet;
use crate::hotspot::{Hotspot, HotspotHandle, Shape};
use crate::spatial::RTree;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    /// Points within this distance (image units) of an edge count as inside.
    pub edge_tolerance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            edge_tolerance: 0.0,
        }
    }
}

/// Even-odd (crossing number) test against one open ring.
pub fn ring_contains(ring: &[Vec2], p: Vec2) -> bool {
    crossings(ring, p) % 2 == 1
}

fn crossings(ring: &[Vec2], p: Vec2) -> usize {
    let n = ring.len();
    if n < 3 {
        return 0;
    }
    let mut count = 0;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                count += 1;
            }
        }
        j = i;
    }
    count
}

/// Euclidean distance from `p` to the closed outline of `ring`.
pub fn distance_to_ring(ring: &[Vec2], p: Vec2) -> f64 {
    let n = ring.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        best = best.min(distance_to_segment(a, b, p));
    }
    best
}

fn distance_to_segment(a: Vec2, b: Vec2, p: Vec2) -> f64 {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Exact containment for a hotspot.
///
/// Polygons apply even-odd over all rings, so inner rings are holes.
/// Multi-polygons contain the point if any ring does.
pub fn hotspot_contains(hotspot: &Hotspot, p: Vec2, opts: PickOptions) -> bool {
    if !hotspot.bbox().contains_point(p.x, p.y) && opts.edge_tolerance <= 0.0 {
        return false;
    }
    let rings = hotspot.rings();
    if opts.edge_tolerance > 0.0
        && rings
            .iter()
            .any(|r| distance_to_ring(r, p) <= opts.edge_tolerance)
    {
        return true;
    }
    match hotspot.shape() {
        Shape::Polygon => rings.iter().map(|r| crossings(r, p)).sum::<usize>() % 2 == 1,
        Shape::MultiPolygon => rings.iter().any(|r| ring_contains(r, p)),
    }
}

/// Point picking over the R-tree.
///
/// Candidates come from a degenerate-box query (expanded by the edge
/// tolerance); only those get the exact test.
///
/// Ordering contract:
/// - The candidate with the smallest bbox area wins (small hotspots sit on
///   top of large ones); ties go to the lower handle index.
pub fn pick_point(
    set: &HotspotSet,
    tree: &RTree,
    p: Vec2,
    opts: PickOptions,
) -> Option<HotspotHandle> {
    let tol = opts.edge_tolerance.max(0.0);
    let probe = foundation::bounds::Aabb2::new([p.x - tol, p.y - tol], [p.x + tol, p.y + tol]);

    let mut best: Option<(f64, HotspotHandle)> = None;
    for handle in tree.query_aabb(&probe) {
        let Some(hotspot) = set.get(handle) else {
            continue;
        };
        if !hotspot_contains(hotspot, p, opts) {
            continue;
        }
        let area = hotspot.bbox().area();
        best = match best {
            Some((best_area, best_handle))
                if stable_total_cmp_f64(best_area, area)
                    .then_with(|| best_handle.index().cmp(&handle.index()))
                    .is_le() =>
            {
                Some((best_area, best_handle))
            }
            _ => Some((area, handle)),
        };
    }
    best.map(|(_, h)| h)
}
