use crate::math::Vec2;

/// Axis-aligned bounding box in a 2D coordinate space (image or screen).
///
/// Boxes are closed: a box touching another along an edge intersects it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Box from two opposite corners in any order.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Aabb2 {
            min: [a.x.min(b.x), a.y.min(b.y)],
            max: [a.x.max(b.x), a.y.max(b.y)],
        }
    }

    pub fn from_center_size(center: Vec2, width: f64, height: f64) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        Aabb2 {
            min: [center.x - hw, center.y - hh],
            max: [center.x + hw, center.y + hh],
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut b = Aabb2::new([x0, y0], [x0, y0]);
        for (x, y) in iter {
            b.min[0] = b.min[0].min(x);
            b.min[1] = b.min[1].min(y);
            b.max[0] = b.max[0].max(x);
            b.max[1] = b.max[1].max(y);
        }
        Some(b)
    }

    /// Degenerate box covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Aabb2::new([x, y], [x, y])
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        )
    }

    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }

    pub fn intersects(&self, other: &Aabb2) -> bool {
        !(self.max[0] < other.min[0]
            || self.min[0] > other.max[0]
            || self.max[1] < other.min[1]
            || self.min[1] > other.max[1])
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min[0] && x <= self.max[0] && y >= self.min[1] && y <= self.max[1]
    }

    pub fn contains(&self, other: &Aabb2) -> bool {
        other.min[0] >= self.min[0]
            && other.min[1] >= self.min[1]
            && other.max[0] <= self.max[0]
            && other.max[1] <= self.max[1]
    }

    pub fn union(&self, other: &Aabb2) -> Aabb2 {
        Aabb2::new(
            [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        )
    }

    /// Grows the box on every side by `fraction` of its own extent.
    ///
    /// `0.2` turns a 100-wide box into a 140-wide one.
    pub fn padded(&self, fraction: f64) -> Aabb2 {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        Aabb2::new(
            [self.min[0] - dx, self.min[1] - dy],
            [self.max[0] + dx, self.max[1] + dy],
        )
    }

    /// Scales the box about its center; `2.0` doubles width and height.
    pub fn scaled(&self, factor: f64) -> Aabb2 {
        Aabb2::from_center_size(self.center(), self.width() * factor, self.height() * factor)
    }

    pub fn translated(&self, d: Vec2) -> Aabb2 {
        Aabb2::new(
            [self.min[0] + d.x, self.min[1] + d.y],
            [self.max[0] + d.x, self.max[1] + d.y],
        )
    }

    /// Area of the overlap with `other` (0 when disjoint).
    pub fn intersection_area(&self, other: &Aabb2) -> f64 {
        let w = self.max[0].min(other.max[0]) - self.min[0].max(other.min[0]);
        let h = self.max[1].min(other.max[1]) - self.min[1].max(other.min[1]);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb2;
    use crate::math::Vec2;

    #[test]
    fn intersects_is_closed() {
        let a = Aabb2::new([0.0, 0.0], [10.0, 10.0]);
        assert!(a.intersects(&Aabb2::new([10.0, 10.0], [20.0, 20.0])));
        assert!(!a.intersects(&Aabb2::new([10.5, 0.0], [20.0, 20.0])));
        assert!(a.intersects(&Aabb2::point(5.0, 5.0)));
    }

    #[test]
    fn from_points_covers_all() {
        let b = Aabb2::from_points([(3.0, -1.0), (-2.0, 4.0), (0.0, 0.0)]).unwrap();
        assert_eq!(b, Aabb2::new([-2.0, -1.0], [3.0, 4.0]));
        assert!(Aabb2::from_points(Vec::<(f64, f64)>::new()).is_none());
    }

    #[test]
    fn padded_and_scaled() {
        let b = Aabb2::new([0.0, 0.0], [100.0, 50.0]);
        assert_eq!(b.padded(0.2), Aabb2::new([-20.0, -10.0], [120.0, 60.0]));
        let s = b.scaled(2.0);
        assert_eq!(s.width(), 200.0);
        assert_eq!(s.center(), Vec2::new(50.0, 25.0));
    }

    #[test]
    fn intersection_area_of_disjoint_is_zero() {
        let a = Aabb2::new([0.0, 0.0], [2.0, 2.0]);
        assert_eq!(a.intersection_area(&Aabb2::new([1.0, 1.0], [3.0, 3.0])), 1.0);
        assert_eq!(a.intersection_area(&Aabb2::new([5.0, 5.0], [6.0, 6.0])), 0.0);
    }
}
