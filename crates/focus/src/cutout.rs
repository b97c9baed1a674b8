//! Screen-space cutouts and the inverse mask drawn around them.

use earcutr::earcut;
use foundation::bounds::Aabb2;
use foundation::math::Vec2;
use scene::{Hotspot, HotspotHandle, Shape, ViewportState};
use tracing::warn;

const DEGENERATE_PX: f64 = 1e-6;
/// Outer-ring margin kept around cutouts reaching past the surface.
const MASK_MARGIN_PX: f64 = 1.0;

/// A hotspot outline projected to screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub handle: HotspotHandle,
    /// Rings cut out of the mask.
    pub outlines: Vec<Vec<Vec2>>,
    /// Polygon holes: inside an outline but still covered.
    pub islands: Vec<Vec<Vec2>>,
    pub bounds: Aabb2,
}

impl Cutout {
    /// Projects `hotspot` through the viewport transform.
    pub fn project(handle: HotspotHandle, hotspot: &Hotspot, viewport: &ViewportState) -> Option<Self> {
        let to_screen = |ring: &Vec<Vec2>| -> Vec<Vec2> {
            ring.iter().map(|p| viewport.image_to_screen(*p)).collect()
        };
        let rings = hotspot.rings();
        let (outlines, islands) = match hotspot.shape() {
            Shape::Polygon => (
                rings.iter().take(1).map(to_screen).collect::<Vec<_>>(),
                rings.iter().skip(1).map(to_screen).collect::<Vec<_>>(),
            ),
            Shape::MultiPolygon => (rings.iter().map(to_screen).collect(), Vec::new()),
        };
        let bounds = Aabb2::from_points(outlines.iter().flatten().map(|p| (p.x, p.y)))?;
        if !bounds.is_finite() {
            return None;
        }
        Some(Self {
            handle,
            outlines,
            islands,
            bounds,
        })
    }

    /// Grows either axis narrower than `min_px` symmetrically about the
    /// bounds center.
    pub fn with_min_size(self, min_px: f64) -> Self {
        let w = self.bounds.width();
        let h = self.bounds.height();
        if w >= min_px && h >= min_px {
            return self;
        }
        let target = Aabb2::from_center_size(self.bounds.center(), w.max(min_px), h.max(min_px));
        self.fitted_to(&target)
    }

    /// The same shape stretched so its bounds become `target`.
    ///
    /// A shape without area on either axis becomes the target rectangle.
    pub fn fitted_to(&self, target: &Aabb2) -> Self {
        let src = self.bounds;
        if src.width() <= DEGENERATE_PX || src.height() <= DEGENERATE_PX {
            return Self {
                handle: self.handle,
                outlines: vec![rect_ring(target)],
                islands: Vec::new(),
                bounds: *target,
            };
        }
        let sx = target.width() / src.width();
        let sy = target.height() / src.height();
        let map = |ring: &Vec<Vec2>| -> Vec<Vec2> {
            ring.iter()
                .map(|p| {
                    Vec2::new(
                        target.min[0] + (p.x - src.min[0]) * sx,
                        target.min[1] + (p.y - src.min[1]) * sy,
                    )
                })
                .collect()
        };
        Self {
            handle: self.handle,
            outlines: self.outlines.iter().map(map).collect(),
            islands: self.islands.iter().map(map).collect(),
            bounds: *target,
        }
    }
}

fn rect_ring(r: &Aabb2) -> Vec<Vec2> {
    vec![
        Vec2::new(r.min[0], r.min[1]),
        Vec2::new(r.max[0], r.min[1]),
        Vec2::new(r.max[0], r.max[1]),
        Vec2::new(r.min[0], r.max[1]),
    ]
}

/// Triangles covering the surface everywhere except the cutouts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InverseMask {
    pub vertices: Vec<Vec2>,
    pub triangles: Vec<[usize; 3]>,
}

impl InverseMask {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|[a, b, c]| {
                let (a, b, c) = (self.vertices[*a], self.vertices[*b], self.vertices[*c]);
                ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() / 2.0
            })
            .sum()
    }

    fn append(&mut self, rings: &[&[Vec2]]) {
        let mut coords: Vec<f64> = Vec::new();
        let mut holes: Vec<usize> = Vec::new();
        let mut points: Vec<Vec2> = Vec::new();
        for (i, ring) in rings.iter().enumerate() {
            if ring.len() < 3 {
                continue;
            }
            if i > 0 {
                holes.push(points.len());
            }
            for p in ring.iter() {
                coords.push(p.x);
                coords.push(p.y);
                points.push(*p);
            }
        }
        if points.len() < 3 {
            return;
        }
        let indices = match earcut(&coords, &holes, 2) {
            Ok(ix) => ix,
            Err(e) => {
                warn!(?e, rings = rings.len(), "mask triangulation failed");
                return;
            }
        };
        let base = self.vertices.len();
        self.vertices.extend(points);
        for t in indices.chunks_exact(3) {
            self.triangles.push([base + t[0], base + t[1], base + t[2]]);
        }
    }
}

/// Triangulates `surface` with every cutout outline as a hole.
///
/// The outer ring is grown to enclose cutouts that reach past the surface so
/// holes never touch it; the host clips to the surface anyway.
pub fn inverse_mask(surface: &Aabb2, cutouts: &[Cutout]) -> InverseMask {
    let mut outer = *surface;
    for c in cutouts {
        let b = c.bounds;
        if !surface.contains(&b) {
            outer = outer.union(&Aabb2::new(
                [b.min[0] - MASK_MARGIN_PX, b.min[1] - MASK_MARGIN_PX],
                [b.max[0] + MASK_MARGIN_PX, b.max[1] + MASK_MARGIN_PX],
            ));
        }
    }
    let outer_ring = rect_ring(&outer);
    let mut rings: Vec<&[Vec2]> = vec![outer_ring.as_slice()];
    rings.extend(cutouts.iter().flat_map(|c| c.outlines.iter().map(Vec::as_slice)));

    let mut mask = InverseMask::default();
    mask.append(&rings);
    for island in cutouts.iter().flat_map(|c| c.islands.iter()) {
        mask.append(&[island.as_slice()]);
    }
    mask
}

#[cfg(test)]
pub(crate) mod fixtures {
    use scene::{Hotspot, HotspotKind, HotspotRecord, Shape};

    pub(crate) fn hotspot(shape: Shape, rings: Vec<Vec<(f64, f64)>>) -> Hotspot {
        Hotspot::from_record(HotspotRecord {
            id: "h".to_string(),
            kind: HotspotKind::AudioOnly,
            shape,
            rings,
            title: None,
            audio_url: None,
            image_url: None,
            link_url: None,
        })
        .unwrap()
    }

    pub(crate) fn square(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
        vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{hotspot, square};
    use super::{Cutout, inverse_mask};
    use foundation::bounds::Aabb2;
    use foundation::handles::Handle;
    use foundation::math::Vec2;
    use pretty_assertions::assert_eq;
    use scene::{Shape, ViewportState};

    fn identity_view() -> ViewportState {
        ViewportState::new(
            Aabb2::new([0.0, 0.0], [800.0, 600.0]),
            1.0,
            Vec2::new(800.0, 600.0),
        )
    }

    #[test]
    fn projection_follows_the_viewport() {
        let h = hotspot(Shape::Polygon, vec![square(100.0, 100.0, 50.0)]);
        let v = ViewportState::new(
            Aabb2::new([0.0, 0.0], [400.0, 300.0]),
            2.0,
            Vec2::new(800.0, 600.0),
        );
        let c = Cutout::project(Handle::new(0, 1), &h, &v).unwrap();
        assert_eq!(c.bounds, Aabb2::new([200.0, 200.0], [300.0, 300.0]));
    }

    #[test]
    fn tiny_cutouts_grow_about_their_center() {
        let h = hotspot(Shape::Polygon, vec![square(100.0, 100.0, 4.0)]);
        let c = Cutout::project(Handle::new(0, 1), &h, &identity_view())
            .unwrap()
            .with_min_size(20.0);
        assert_eq!(c.bounds, Aabb2::new([92.0, 92.0], [112.0, 112.0]));
        assert_eq!(c.outlines[0][0], Vec2::new(92.0, 92.0));
        assert_eq!(c.outlines[0][2], Vec2::new(112.0, 112.0));
    }

    #[test]
    fn mask_covers_everything_but_the_cutout() {
        let h = hotspot(Shape::Polygon, vec![square(100.0, 100.0, 100.0)]);
        let c = Cutout::project(Handle::new(0, 1), &h, &identity_view()).unwrap();
        let surface = Aabb2::new([0.0, 0.0], [800.0, 600.0]);
        let mask = inverse_mask(&surface, &[c]);
        assert!((mask.area() - (480_000.0 - 10_000.0)).abs() < 1e-6);
    }

    #[test]
    fn polygon_holes_stay_covered() {
        let h = hotspot(
            Shape::Polygon,
            vec![square(100.0, 100.0, 200.0), square(150.0, 150.0, 100.0)],
        );
        let c = Cutout::project(Handle::new(0, 1), &h, &identity_view()).unwrap();
        assert_eq!(c.islands.len(), 1);
        let mask = inverse_mask(&Aabb2::new([0.0, 0.0], [800.0, 600.0]), &[c]);
        assert!((mask.area() - (480_000.0 - 40_000.0 + 10_000.0)).abs() < 1e-6);
    }

    #[test]
    fn empty_cutout_list_covers_the_surface() {
        let mask = inverse_mask(&Aabb2::new([0.0, 0.0], [800.0, 600.0]), &[]);
        assert_eq!(mask.triangles.len(), 2);
        assert!((mask.area() - 480_000.0).abs() < 1e-6);
    }
}
