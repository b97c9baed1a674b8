use foundation::bounds::Aabb2;

/// Longest integration step; longer frames are subdivided.
const MAX_STEP_S: f64 = 1.0 / 120.0;
const SETTLE_EPSILON: f64 = 0.05;

/// Mass-spring-damper on one scalar, integrated semi-implicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub current: f64,
    pub target: f64,
    pub velocity: f64,
    pub k: f64,
    pub c: f64,
    pub m: f64,
}

impl Spring {
    pub fn new(current: f64, target: f64, stiffness: f64, damping: f64, mass: f64) -> Self {
        Self {
            current,
            target,
            velocity: 0.0,
            k: stiffness.max(0.0001),
            c: damping.max(0.0),
            m: mass.max(0.0001),
        }
    }

    /// Spring at rest on `value` with critical damping.
    pub fn critically_damped(value: f64, stiffness: f64, mass: f64) -> Self {
        Self::new(value, value, stiffness, Self::critical_damping(stiffness, mass), mass)
    }

    pub fn critical_damping(stiffness: f64, mass: f64) -> f64 {
        2.0 * (stiffness.max(0.0001) * mass.max(0.0001)).sqrt()
    }

    pub fn tick(&mut self, dt: f64) -> f64 {
        if dt.is_nan() || dt <= 0.0 {
            return self.current;
        }
        let steps = (dt / MAX_STEP_S).ceil().max(1.0) as usize;
        let h = dt / steps as f64;
        for _ in 0..steps {
            let acceleration =
                (self.k * (self.target - self.current) - self.c * self.velocity) / self.m;
            self.velocity += acceleration * h;
            self.current += self.velocity * h;
        }
        self.current
    }

    pub fn snap(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.velocity = 0.0;
    }

    pub fn is_settled(&self) -> bool {
        (self.target - self.current).abs() < SETTLE_EPSILON && self.velocity.abs() < SETTLE_EPSILON
    }
}

/// Four springs smoothing a screen rectangle's edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringRect {
    edges: [Spring; 4],
    initialized: bool,
}

impl SpringRect {
    pub fn new(stiffness: f64, mass: f64) -> Self {
        Self {
            edges: [Spring::critically_damped(0.0, stiffness, mass); 4],
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn current(&self) -> Aabb2 {
        let [x0, y0, x1, y1] = self.edges.map(|s| s.current);
        Aabb2::new([x0, y0], [x1, y1])
    }

    pub fn snap(&mut self, rect: &Aabb2) {
        for (spring, v) in self.edges.iter_mut().zip(edges_of(rect)) {
            spring.snap(v);
        }
        self.initialized = true;
    }

    /// Moves toward `rect`; the first call after a reset snaps.
    pub fn follow(&mut self, rect: &Aabb2, dt: f64) -> Aabb2 {
        if !self.initialized {
            self.snap(rect);
            return *rect;
        }
        for (spring, v) in self.edges.iter_mut().zip(edges_of(rect)) {
            spring.target = v;
            spring.tick(dt);
        }
        self.current()
    }

    pub fn is_settled(&self) -> bool {
        self.edges.iter().all(Spring::is_settled)
    }

    pub fn reset(&mut self) {
        self.initialized = false;
    }
}

fn edges_of(rect: &Aabb2) -> [f64; 4] {
    [rect.min[0], rect.min[1], rect.max[0], rect.max[1]]
}

#[cfg(test)]
mod tests {
    use super::{Spring, SpringRect};
    use foundation::bounds::Aabb2;

    #[test]
    fn critical_spring_converges_without_overshoot() {
        let mut s = Spring::critically_damped(0.0, 170.0, 1.0);
        s.target = 100.0;
        let mut peak: f64 = 0.0;
        for _ in 0..120 {
            peak = peak.max(s.tick(1.0 / 60.0));
        }
        assert!((s.current - 100.0).abs() < 0.1, "ended at {}", s.current);
        assert!(peak < 100.5, "overshoot to {peak}");
    }

    #[test]
    fn long_frames_stay_stable() {
        let mut s = Spring::critically_damped(0.0, 170.0, 1.0);
        s.target = 10.0;
        s.tick(0.5);
        assert!(s.current.is_finite());
        assert!((s.current - 10.0).abs() < 1.0);
    }

    #[test]
    fn rect_snaps_first_then_follows() {
        let mut r = SpringRect::new(170.0, 1.0);
        let a = Aabb2::new([0.0, 0.0], [10.0, 10.0]);
        assert_eq!(r.follow(&a, 1.0 / 60.0), a);
        let b = Aabb2::new([100.0, 0.0], [110.0, 10.0]);
        let mid = r.follow(&b, 1.0 / 60.0);
        assert!(mid.min[0] > 0.0 && mid.min[0] < 100.0);
        assert!(!r.is_settled());
        for _ in 0..180 {
            r.follow(&b, 1.0 / 60.0);
        }
        assert!(r.is_settled());
    }
}
