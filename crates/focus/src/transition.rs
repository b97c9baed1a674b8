use foundation::bounds::Aabb2;
use foundation::math::Vec2;
use foundation::math::precision::ease_in_out_cubic;
use foundation::time::Time;
use scene::ViewportState;
use serde::{Deserialize, Serialize};

use crate::cutout::Cutout;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    /// Opacity dips to zero at the midpoint, where the cutout jumps.
    FadeOutIn,
    /// Opacity is held while the cutout travels to the new hotspot.
    Morph,
}

impl SwitchKind {
    /// Nearby hotspots fade; distant ones morph.
    pub fn choose(from: Vec2, to: Vec2, viewport: &ViewportState, close_fraction: f64) -> Self {
        let diagonal = viewport.bounds.diagonal();
        let distance = if diagonal > 0.0 {
            from.distance(to) / diagonal
        } else {
            0.0
        };
        if distance <= close_fraction {
            SwitchKind::FadeOutIn
        } else {
            SwitchKind::Morph
        }
    }
}

/// What a switch contributes to one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchFrame {
    pub cutout: Cutout,
    pub opacity_factor: f64,
}

/// A running change of selection from one hotspot to another.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchTransition {
    pub kind: SwitchKind,
    /// Outgoing cutout as last shown.
    pub from: Cutout,
    pub started_at: Time,
    pub duration_s: f64,
}

impl SwitchTransition {
    pub fn new(kind: SwitchKind, from: Cutout, started_at: Time, duration_s: f64) -> Self {
        Self {
            kind,
            from,
            started_at,
            duration_s,
        }
    }

    /// Eased progress in `[0, 1]`.
    pub fn progress(&self, now: Time) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        ease_in_out_cubic(now.since(self.started_at) / self.duration_s)
    }

    pub fn is_finished(&self, now: Time) -> bool {
        now.since(self.started_at) >= self.duration_s
    }

    /// Blends the outgoing cutout with the incoming `to` at `now`.
    pub fn frame(&self, to: &Cutout, now: Time) -> SwitchFrame {
        let t = self.progress(now);
        match self.kind {
            SwitchKind::FadeOutIn => {
                if t < 0.5 {
                    SwitchFrame {
                        cutout: self.from.clone(),
                        opacity_factor: 1.0 - 2.0 * t,
                    }
                } else {
                    SwitchFrame {
                        cutout: to.clone(),
                        opacity_factor: 2.0 * t - 1.0,
                    }
                }
            }
            SwitchKind::Morph => SwitchFrame {
                cutout: to.fitted_to(&lerp_rect(&self.from.bounds, &to.bounds, t)),
                opacity_factor: 1.0,
            },
        }
    }
}

fn lerp_rect(a: &Aabb2, b: &Aabb2, t: f64) -> Aabb2 {
    let lerp = |x: f64, y: f64| x + (y - x) * t;
    Aabb2::new(
        [lerp(a.min[0], b.min[0]), lerp(a.min[1], b.min[1])],
        [lerp(a.max[0], b.max[0]), lerp(a.max[1], b.max[1])],
    )
}
