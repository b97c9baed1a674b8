use foundation::bounds::Aabb2;
use foundation::time::Time;
use scene::{HotspotHandle, ViewportState};
use serde::{Deserialize, Serialize};

use crate::profile::FocusProfile;
use crate::score::{FocusInputs, FocusReference, SubScores};

/// Why a selection ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeselectReason {
    /// Zoom fell below the absolute minimum.
    ZoomTooLow,
    /// Zoom fell too far below the zoom at selection.
    ZoomedOut,
    /// The hotspot covers almost none of the viewport.
    TooSmall,
    /// The combined score dropped under the deselect threshold.
    LowScore,
    /// The hotspot is gone from the live dataset.
    HotspotRemoved,
    /// Cleared by the host.
    Manual,
}

impl DeselectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DeselectReason::ZoomTooLow => "zoom_too_low",
            DeselectReason::ZoomedOut => "zoomed_out",
            DeselectReason::TooSmall => "too_small",
            DeselectReason::LowScore => "low_score",
            DeselectReason::HotspotRemoved => "hotspot_removed",
            DeselectReason::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DeselectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation of the selected hotspot against the current viewport.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct FocusEvaluation {
    pub inputs: FocusInputs,
    pub sub_scores: SubScores,
    pub target: f64,
}

/// The active selection and its eased score.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusSession {
    pub selected: HotspotHandle,
    pub reference: FocusReference,
    pub selected_at: Time,
    pub current_score: f64,
    pub target_score: f64,
    last: Option<FocusEvaluation>,
}

impl FocusSession {
    pub fn begin(selected: HotspotHandle, bbox: &Aabb2, viewport: &ViewportState, now: Time) -> Self {
        Self {
            selected,
            reference: FocusReference::capture(viewport, bbox),
            selected_at: now,
            current_score: 1.0,
            target_score: 1.0,
            last: None,
        }
    }

    pub fn in_grace(&self, profile: &FocusProfile, now: Time) -> bool {
        now.since(self.selected_at) < profile.grace_period_s
    }

    pub fn last_evaluation(&self) -> Option<&FocusEvaluation> {
        self.last.as_ref()
    }

    /// Re-scores against `viewport` and eases the current score one step.
    pub fn evaluate(
        &mut self,
        profile: &FocusProfile,
        viewport: &ViewportState,
        bbox: &Aabb2,
    ) -> FocusEvaluation {
        let inputs = FocusInputs::measure(viewport, bbox);
        let sub_scores = SubScores::compute(profile, &self.reference, &inputs);
        let target = sub_scores.combine(profile);
        self.target_score = target;

        let gap = target - self.current_score;
        if gap.abs() <= profile.snap_epsilon {
            self.current_score = target;
        } else {
            self.current_score += gap * profile.easing.clamp(0.0, 1.0);
        }

        let eval = FocusEvaluation {
            inputs,
            sub_scores,
            target,
        };
        self.last = Some(eval);
        eval
    }

    /// First auto-deselect condition that holds, outside the grace period.
    pub fn deselect_reason(
        &self,
        profile: &FocusProfile,
        eval: &FocusEvaluation,
        now: Time,
    ) -> Option<DeselectReason> {
        if self.in_grace(profile, now) {
            return None;
        }
        let inputs = &eval.inputs;
        if inputs.zoom < profile.min_absolute_zoom {
            Some(DeselectReason::ZoomTooLow)
        } else if self.reference.zoom_ratio(inputs.zoom) < profile.min_zoom_ratio {
            Some(DeselectReason::ZoomedOut)
        } else if inputs.coverage < profile.min_coverage {
            Some(DeselectReason::TooSmall)
        } else if eval.target < profile.deselect_threshold {
            Some(DeselectReason::LowScore)
        } else {
            None
        }
    }
}
