use foundation::bounds::Aabb2;
use serde::{Deserialize, Serialize};

/// Address of one tile in the image pyramid.
///
/// Level 0 is the coarsest (whole image in about one tile); `max_level` is
/// full resolution. Keys order by `(level, y, x)` so traversal is stable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub y: u32,
    pub x: u32,
}

impl TileKey {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, y, x }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}_{}", self.level, self.x, self.y)
    }
}

/// Deep-zoom pyramid geometry for an image of `width` x `height` pixels.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilePyramid {
    pub width: f64,
    pub height: f64,
    pub tile_size: u32,
}

impl TilePyramid {
    pub fn new(width: f64, height: f64, tile_size: u32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            tile_size: tile_size.max(1),
        }
    }

    pub fn image_bounds(&self) -> Aabb2 {
        Aabb2::new([0.0, 0.0], [self.width, self.height])
    }

    /// Level at which the whole image is stored at native resolution.
    pub fn max_level(&self) -> u32 {
        self.width.max(self.height).log2().ceil().max(0.0) as u32
    }

    /// Stored pixels per image unit at `level` (1.0 at `max_level`).
    pub fn level_scale(&self, level: u32) -> f64 {
        let level = level.min(self.max_level());
        0.5f64.powi((self.max_level() - level) as i32)
    }

    /// Image units covered by one tile edge at `level`.
    pub fn tile_extent(&self, level: u32) -> f64 {
        self.tile_size as f64 / self.level_scale(level)
    }

    pub fn columns(&self, level: u32) -> u32 {
        (self.width / self.tile_extent(level)).ceil().max(1.0) as u32
    }

    pub fn rows(&self, level: u32) -> u32 {
        (self.height / self.tile_extent(level)).ceil().max(1.0) as u32
    }

    /// Coarsest level whose resolution meets `screen_px_per_unit`.
    pub fn level_for_scale(&self, screen_px_per_unit: f64) -> u32 {
        let max = self.max_level();
        if !screen_px_per_unit.is_finite() || screen_px_per_unit <= 0.0 {
            return 0;
        }
        let needed = screen_px_per_unit.log2().ceil();
        let level = max as f64 + needed;
        level.clamp(0.0, max as f64) as u32
    }

    /// Image-space bounds of a tile, clipped to the image.
    pub fn tile_bounds(&self, key: TileKey) -> Aabb2 {
        let extent = self.tile_extent(key.level);
        let x0 = key.x as f64 * extent;
        let y0 = key.y as f64 * extent;
        Aabb2::new(
            [x0.min(self.width), y0.min(self.height)],
            [(x0 + extent).min(self.width), (y0 + extent).min(self.height)],
        )
    }

    /// Tiles at `level` intersecting `region`, ordered by `(y, x)`.
    pub fn tiles_in(&self, region: &Aabb2, level: u32) -> Vec<TileKey> {
        let Some(clipped) = clip(region, &self.image_bounds()) else {
            return Vec::new();
        };
        let extent = self.tile_extent(level);
        let last_col = self.columns(level) - 1;
        let last_row = self.rows(level) - 1;
        let col = |v: f64| ((v / extent).floor().max(0.0) as u32).min(last_col);
        let row = |v: f64| ((v / extent).floor().max(0.0) as u32).min(last_row);

        let mut out = Vec::new();
        for y in row(clipped.min[1])..=row(clipped.max[1]) {
            for x in col(clipped.min[0])..=col(clipped.max[0]) {
                out.push(TileKey::new(level, x, y));
            }
        }
        out
    }
}

fn clip(a: &Aabb2, b: &Aabb2) -> Option<Aabb2> {
    if !a.intersects(b) || !a.is_finite() {
        return None;
    }
    Some(Aabb2::new(
        [a.min[0].max(b.min[0]), a.min[1].max(b.min[1])],
        [a.max[0].min(b.max[0]), a.max[1].min(b.max[1])],
    ))
}

#[cfg(test)]
mod tests {
    use super::{TileKey, TilePyramid};
    use foundation::bounds::Aabb2;

    #[test]
    fn levels_and_extents() {
        let p = TilePyramid::new(4096.0, 2048.0, 256);
        assert_eq!(p.max_level(), 12);
        assert_eq!(p.level_scale(12), 1.0);
        assert_eq!(p.level_scale(11), 0.5);
        assert_eq!(p.tile_extent(11), 512.0);
        assert_eq!(p.columns(12), 16);
        assert_eq!(p.rows(12), 8);
        assert_eq!(p.columns(0), 1);
    }

    #[test]
    fn level_for_scale_picks_coarsest_sufficient() {
        let p = TilePyramid::new(4096.0, 4096.0, 256);
        assert_eq!(p.level_for_scale(1.0), 12);
        assert_eq!(p.level_for_scale(0.5), 11);
        assert_eq!(p.level_for_scale(0.3), 11);
        assert_eq!(p.level_for_scale(8.0), 12);
        assert_eq!(p.level_for_scale(1e-9), 0);
    }

    #[test]
    fn tiles_in_region_are_clipped_to_image() {
        let p = TilePyramid::new(1024.0, 1024.0, 256);
        let keys = p.tiles_in(&Aabb2::new([-100.0, 300.0], [300.0, 2000.0]), 10);
        assert_eq!(keys.len(), 2 * 3);
        assert_eq!(keys[0], TileKey::new(10, 0, 1));
        assert!(p.tiles_in(&Aabb2::new([2000.0, 0.0], [3000.0, 10.0]), 10).is_empty());
        assert_eq!(
            p.tile_bounds(TileKey::new(10, 3, 3)),
            Aabb2::new([768.0, 768.0], [1024.0, 1024.0])
        );
    }
}
