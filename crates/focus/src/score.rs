//! Focus-score math.
//!
//! Every sub-score is relative to the viewport captured at selection time, so
//! a fresh selection scores exactly 1 and returning to that viewport restores
//! it.

use foundation::bounds::Aabb2;
use foundation::math::Vec2;
use foundation::math::precision::smoothstep;
use scene::ViewportState;
use serde::Serialize;

use crate::profile::FocusProfile;

/// What the score measures about a hotspot in one viewport.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct FocusInputs {
    pub zoom: f64,
    /// Hotspot bbox area inside the viewport over the viewport area.
    pub coverage: f64,
    /// Hotspot center to viewport center, as a fraction of the viewport
    /// diagonal.
    pub distance: f64,
}

impl FocusInputs {
    pub fn measure(viewport: &ViewportState, bbox: &Aabb2) -> Self {
        let diagonal = viewport.bounds.diagonal();
        let distance = if diagonal > 0.0 {
            bbox.center().distance(viewport.center) / diagonal
        } else {
            0.0
        };
        Self {
            zoom: viewport.zoom,
            coverage: viewport.coverage_of(bbox),
            distance,
        }
    }
}

/// Viewport captured when a hotspot was selected.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FocusReference {
    pub zoom: f64,
    pub center: Vec2,
    pub coverage: f64,
    pub distance: f64,
}

impl FocusReference {
    pub fn capture(viewport: &ViewportState, bbox: &Aabb2) -> Self {
        let inputs = FocusInputs::measure(viewport, bbox);
        Self {
            zoom: inputs.zoom,
            center: viewport.center,
            coverage: inputs.coverage,
            distance: inputs.distance,
        }
    }

    pub fn zoom_ratio(&self, zoom: f64) -> f64 {
        if self.zoom > 0.0 { zoom / self.zoom } else { 1.0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct SubScores {
    pub zoom: f64,
    pub distance: f64,
    pub coverage: f64,
}

impl SubScores {
    pub fn compute(profile: &FocusProfile, reference: &FocusReference, inputs: &FocusInputs) -> Self {
        let ratio = reference.zoom_ratio(inputs.zoom);
        let zoom = smoothstep(profile.zoom_fade_end, profile.zoom_fade_start, ratio);

        let excess = (inputs.distance - reference.distance).max(0.0);
        let distance = if profile.max_distance_fraction > 0.0 {
            (-profile.distance_decay * excess / profile.max_distance_fraction).exp()
        } else if excess > 0.0 {
            0.0
        } else {
            1.0
        };

        // Panning a hotspot into full view must not out-score zooming away.
        let coverage = if reference.coverage > 0.0 {
            (inputs.coverage / reference.coverage).min(1.0)
        } else {
            1.0
        };
        let coverage = coverage.min(ratio.max(0.0)).clamp(0.0, 1.0);

        Self {
            zoom,
            distance: distance.clamp(0.0, 1.0),
            coverage,
        }
    }

    /// Weighted, curved and floored combination.
    pub fn combine(&self, profile: &FocusProfile) -> f64 {
        let w = profile.weights;
        let total = w.zoom + w.distance + w.coverage;
        let weighted = if total > 0.0 {
            (w.zoom * self.zoom + w.distance * self.distance + w.coverage * self.coverage) / total
        } else {
            1.0
        };
        let curved = profile.curve.apply(weighted);
        if curved < profile.score_floor {
            0.0
        } else {
            curved
        }
    }
}

/// Target score for `bbox` in `viewport` against `reference`.
pub fn focus_score(
    profile: &FocusProfile,
    reference: &FocusReference,
    viewport: &ViewportState,
    bbox: &Aabb2,
) -> f64 {
    let inputs = FocusInputs::measure(viewport, bbox);
    SubScores::compute(profile, reference, &inputs).combine(profile)
}
