use foundation::bounds::Aabb2;
use foundation::math::Vec2;

/// Camera snapshot taken on a viewport-change notification.
///
/// A plain value: consumers keep copies, never references into the renderer.
/// `bounds` is the image-space rectangle shown in a container of
/// `container_size_px` screen pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportState {
    pub bounds: Aabb2,
    pub zoom: f64,
    pub center: Vec2,
    pub container_size_px: Vec2,
}

impl ViewportState {
    pub fn new(bounds: Aabb2, zoom: f64, container_size_px: Vec2) -> Self {
        Self {
            bounds,
            zoom,
            center: bounds.center(),
            container_size_px,
        }
    }

    /// Viewport centered on `center` where zoom 1.0 shows `home_width` image
    /// units across the container.
    pub fn centered(center: Vec2, zoom: f64, container_size_px: Vec2, home_width: f64) -> Self {
        let zoom = zoom.max(f64::MIN_POSITIVE);
        let width = home_width / zoom;
        let aspect = if container_size_px.x > 0.0 {
            container_size_px.y / container_size_px.x
        } else {
            1.0
        };
        let bounds = Aabb2::from_center_size(center, width, width * aspect);
        Self {
            bounds,
            zoom,
            center,
            container_size_px,
        }
    }

    /// Screen pixels per image unit on each axis.
    pub fn scale(&self) -> Vec2 {
        let w = self.bounds.width();
        let h = self.bounds.height();
        Vec2::new(
            if w > 0.0 { self.container_size_px.x / w } else { 0.0 },
            if h > 0.0 { self.container_size_px.y / h } else { 0.0 },
        )
    }

    pub fn image_to_screen(&self, p: Vec2) -> Vec2 {
        let s = self.scale();
        Vec2::new(
            (p.x - self.bounds.min[0]) * s.x,
            (p.y - self.bounds.min[1]) * s.y,
        )
    }

    pub fn screen_to_image(&self, p: Vec2) -> Vec2 {
        let s = self.scale();
        Vec2::new(
            if s.x > 0.0 { p.x / s.x } else { 0.0 } + self.bounds.min[0],
            if s.y > 0.0 { p.y / s.y } else { 0.0 } + self.bounds.min[1],
        )
    }

    pub fn image_rect_to_screen(&self, r: &Aabb2) -> Aabb2 {
        Aabb2::from_corners(
            self.image_to_screen(Vec2::new(r.min[0], r.min[1])),
            self.image_to_screen(Vec2::new(r.max[0], r.max[1])),
        )
    }

    pub fn screen_rect(&self) -> Aabb2 {
        Aabb2::new([0.0, 0.0], [self.container_size_px.x, self.container_size_px.y])
    }

    /// Image-space bounds grown by `fraction` of the extent on each side.
    pub fn padded_bounds(&self, fraction: f64) -> Aabb2 {
        self.bounds.padded(fraction)
    }

    /// Fraction of the viewport area covered by `r` (clipped to the view).
    pub fn coverage_of(&self, r: &Aabb2) -> f64 {
        let view_area = self.bounds.area();
        if view_area <= 0.0 {
            return 0.0;
        }
        self.bounds.intersection_area(r) / view_area
    }
}

#[cfg(test)]
mod tests {
    use super::ViewportState;
    use foundation::bounds::Aabb2;
    use foundation::math::Vec2;

    #[test]
    fn screen_transform_round_trips() {
        let v = ViewportState::new(
            Aabb2::new([100.0, 200.0], [300.0, 300.0]),
            2.0,
            Vec2::new(800.0, 400.0),
        );
        assert_eq!(v.scale(), Vec2::new(4.0, 4.0));
        let s = v.image_to_screen(Vec2::new(150.0, 250.0));
        assert_eq!(s, Vec2::new(200.0, 200.0));
        assert_eq!(v.screen_to_image(s), Vec2::new(150.0, 250.0));
    }

    #[test]
    fn centered_respects_zoom_and_aspect() {
        let v = ViewportState::centered(Vec2::new(500.0, 500.0), 4.0, Vec2::new(1000.0, 500.0), 1000.0);
        assert_eq!(v.bounds.width(), 250.0);
        assert_eq!(v.bounds.height(), 125.0);
        assert_eq!(v.center, Vec2::new(500.0, 500.0));
    }

    #[test]
    fn coverage_is_clipped_to_view() {
        let v = ViewportState::new(Aabb2::new([0.0, 0.0], [10.0, 10.0]), 1.0, Vec2::new(10.0, 10.0));
        assert_eq!(v.coverage_of(&Aabb2::new([0.0, 0.0], [5.0, 10.0])), 0.5);
        assert_eq!(v.coverage_of(&Aabb2::new([5.0, 0.0], [50.0, 10.0])), 0.5);
        assert_eq!(v.coverage_of(&Aabb2::new([20.0, 20.0], [30.0, 30.0])), 0.0);
    }
}
