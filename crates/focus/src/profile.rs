use serde::{Deserialize, Serialize};

/// Relative weight of each sub-score. Normalised before use.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusWeights {
    pub zoom: f64,
    pub distance: f64,
    pub coverage: f64,
}

impl Default for FocusWeights {
    fn default() -> Self {
        Self {
            zoom: 0.4,
            distance: 0.35,
            coverage: 0.25,
        }
    }
}

/// Shaping applied to the weighted sum before the floor.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCurve {
    Linear,
    #[default]
    Smoothstep,
    Power(f64),
}

impl ScoreCurve {
    pub fn apply(self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            ScoreCurve::Linear => x,
            ScoreCurve::Smoothstep => x * x * (3.0 - 2.0 * x),
            ScoreCurve::Power(p) if p > 0.0 => x.powf(p),
            ScoreCurve::Power(_) => x,
        }
    }
}

/// Every tunable of the focus overlay.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusProfile {
    /// Score updates per second; calls in between are throttled.
    pub update_hz: f64,
    /// Zoom ratio at and above which the zoom sub-score is 1.
    pub zoom_fade_start: f64,
    /// Zoom ratio at and below which the zoom sub-score is 0.
    pub zoom_fade_end: f64,
    pub distance_decay: f64,
    /// Distance (fraction of the viewport diagonal) the decay is scaled by.
    pub max_distance_fraction: f64,
    pub weights: FocusWeights,
    pub curve: ScoreCurve,
    /// Combined scores below this are reported as exactly 0.
    pub score_floor: f64,
    /// Fraction of the gap to the target closed per update.
    pub easing: f64,
    pub snap_epsilon: f64,

    pub grace_period_s: f64,
    pub min_absolute_zoom: f64,
    pub min_zoom_ratio: f64,
    pub min_coverage: f64,
    pub deselect_threshold: f64,

    /// Overlay opacity at score 1.
    pub base_opacity: f64,
    pub min_cutout_px: f64,
    pub spring_stiffness: f64,
    pub spring_mass: f64,

    /// Centers closer than this fraction of the viewport diagonal fade
    /// instead of morphing on a selection switch.
    pub close_switch_fraction: f64,
    pub switch_duration_s: f64,
}

pub const DESKTOP_GRACE_PERIOD_S: f64 = 1.2;
pub const TOUCH_GRACE_PERIOD_S: f64 = 1.0;

impl Default for FocusProfile {
    fn default() -> Self {
        Self {
            update_hz: 60.0,
            zoom_fade_start: 0.8,
            zoom_fade_end: 0.35,
            distance_decay: 3.0,
            max_distance_fraction: 0.5,
            weights: FocusWeights::default(),
            curve: ScoreCurve::Smoothstep,
            score_floor: 0.05,
            easing: 0.25,
            snap_epsilon: 0.001,
            grace_period_s: DESKTOP_GRACE_PERIOD_S,
            min_absolute_zoom: 0.5,
            min_zoom_ratio: 0.3,
            min_coverage: 0.0005,
            deselect_threshold: 0.35,
            base_opacity: 0.6,
            min_cutout_px: 20.0,
            spring_stiffness: 170.0,
            spring_mass: 1.0,
            close_switch_fraction: 0.35,
            switch_duration_s: 1.0,
        }
    }
}

impl FocusProfile {
    /// Defaults with the grace period suited to the input device.
    pub fn for_device(touch: bool) -> Self {
        Self {
            grace_period_s: if touch {
                TOUCH_GRACE_PERIOD_S
            } else {
                DESKTOP_GRACE_PERIOD_S
            },
            ..Self::default()
        }
    }

    pub fn update_interval_s(&self) -> f64 {
        if self.update_hz > 0.0 {
            1.0 / self.update_hz
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FocusProfile, ScoreCurve};

    #[test]
    fn touch_devices_get_a_shorter_grace_period() {
        assert_eq!(FocusProfile::for_device(false).grace_period_s, 1.2);
        assert_eq!(FocusProfile::for_device(true).grace_period_s, 1.0);
    }

    #[test]
    fn curves_fix_the_endpoints() {
        for curve in [ScoreCurve::Linear, ScoreCurve::Smoothstep, ScoreCurve::Power(2.0)] {
            assert_eq!(curve.apply(0.0), 0.0);
            assert_eq!(curve.apply(1.0), 1.0);
        }
        assert_eq!(ScoreCurve::Power(2.0).apply(0.5), 0.25);
        assert_eq!(ScoreCurve::Smoothstep.apply(0.5), 0.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let p: FocusProfile =
            serde_json::from_str(r#"{"grace_period_s": 2.0, "curve": {"power": 1.5}}"#).unwrap();
        assert_eq!(p.grace_period_s, 2.0);
        assert_eq!(p.curve, ScoreCurve::Power(1.5));
        assert_eq!(p.base_opacity, FocusProfile::default().base_opacity);
    }
}
