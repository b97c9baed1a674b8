//! Smooth-while-moving, crisp-when-still.
//!
//! The machine only decides which filtering the renderer should use; it never
//! decides what gets drawn.

use std::collections::BTreeSet;

use foundation::math::Vec2;
use foundation::time::Time;
use scene::ViewportState;
use serde::{Deserialize, Serialize};

use crate::renderer::{GestureKind, RenderHints};

pub const DEFAULT_MOTION_EPSILON: f64 = 0.005;
pub const DEFAULT_EXIT_DEBOUNCE_S: f64 = 0.08;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Static,
    Animating,
}

impl RenderMode {
    pub fn hints(self) -> RenderHints {
        match self {
            RenderMode::Static => RenderHints::Crisp,
            RenderMode::Animating => RenderHints::Smooth,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderModeConfig {
    /// Relative zoom change, or pan as a fraction of the viewport width,
    /// that counts as motion.
    pub motion_epsilon: f64,
    /// Quiet time required before returning to `Static`.
    pub exit_debounce_s: f64,
}

impl Default for RenderModeConfig {
    fn default() -> Self {
        Self {
            motion_epsilon: DEFAULT_MOTION_EPSILON,
            exit_debounce_s: DEFAULT_EXIT_DEBOUNCE_S,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub from: RenderMode,
    pub to: RenderMode,
}

#[derive(Debug, Clone)]
pub struct RenderModeMachine {
    config: RenderModeConfig,
    mode: RenderMode,
    animating: bool,
    gestures: BTreeSet<GestureKind>,
    last_motion: Option<Time>,
    last_camera: Option<(f64, Vec2)>,
    crisp_pending: bool,
}

impl RenderModeMachine {
    pub fn new(config: RenderModeConfig) -> Self {
        Self {
            config,
            mode: RenderMode::Static,
            animating: false,
            gestures: BTreeSet::new(),
            last_motion: None,
            last_camera: None,
            crisp_pending: false,
        }
    }

    pub fn config(&self) -> RenderModeConfig {
        self.config
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Whether an animation or gesture is still in progress.
    pub fn is_held(&self) -> bool {
        self.animating || !self.gestures.is_empty()
    }

    pub fn animation_start(&mut self, now: Time) -> Option<ModeChange> {
        self.animating = true;
        self.motion(now)
    }

    pub fn animation_finish(&mut self, now: Time) {
        self.animating = false;
        self.last_motion = Some(now);
    }

    pub fn gesture_start(&mut self, kind: GestureKind, now: Time) -> Option<ModeChange> {
        self.gestures.insert(kind);
        self.motion(now)
    }

    pub fn gesture_end(&mut self, kind: GestureKind, now: Time) {
        self.gestures.remove(&kind);
        self.last_motion = Some(now);
    }

    /// Compares the camera with the previous one and enters `Animating` if
    /// zoom or pan moved more than the epsilon.
    pub fn viewport_changed(&mut self, viewport: &ViewportState, now: Time) -> Option<ModeChange> {
        let camera = (viewport.zoom, viewport.center);
        let previous = self.last_camera.replace(camera);
        let Some((zoom, center)) = previous else {
            return None;
        };
        let zoom_delta = if zoom > 0.0 {
            ((viewport.zoom - zoom) / zoom).abs()
        } else {
            0.0
        };
        let width = viewport.bounds.width();
        let pan_delta = if width > 0.0 {
            viewport.center.distance(center) / width
        } else {
            0.0
        };
        if zoom_delta > self.config.motion_epsilon || pan_delta > self.config.motion_epsilon {
            self.motion(now)
        } else {
            None
        }
    }

    fn motion(&mut self, now: Time) -> Option<ModeChange> {
        self.last_motion = Some(now);
        self.crisp_pending = false;
        if self.mode == RenderMode::Animating {
            return None;
        }
        self.mode = RenderMode::Animating;
        Some(ModeChange {
            from: RenderMode::Static,
            to: RenderMode::Animating,
        })
    }

    /// Returns to `Static` once the camera has been quiet for the exit
    /// debounce and nothing holds it in motion.
    pub fn settle(&mut self, now: Time) -> Option<ModeChange> {
        if self.mode != RenderMode::Animating || self.is_held() {
            return None;
        }
        let quiet = self
            .last_motion
            .is_none_or(|t| now.since(t) >= self.config.exit_debounce_s - 1e-9);
        if !quiet {
            return None;
        }
        self.mode = RenderMode::Static;
        self.crisp_pending = true;
        Some(ModeChange {
            from: RenderMode::Animating,
            to: RenderMode::Static,
        })
    }

    /// Earliest time `settle` could succeed, if the machine is animating.
    pub fn settle_deadline(&self) -> Option<Time> {
        if self.mode != RenderMode::Animating {
            return None;
        }
        Some(match self.last_motion {
            Some(t) => t.after(self.config.exit_debounce_s),
            None => Time::ZERO,
        })
    }

    /// The crisp actuation scheduled by entering `Static`, taken once.
    pub fn take_crisp(&mut self) -> bool {
        std::mem::take(&mut self.crisp_pending)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::{ModeChange, RenderMode, RenderModeConfig, RenderModeMachine};
    use crate::renderer::GestureKind;
    use foundation::math::Vec2;
    use foundation::time::Time;
    use scene::ViewportState;

    fn view(cx: f64, zoom: f64) -> ViewportState {
        ViewportState::centered(Vec2::new(cx, 500.0), zoom, Vec2::new(800.0, 600.0), 1000.0)
    }

    #[test]
    fn tiny_camera_jitter_is_not_motion() {
        let mut m = RenderModeMachine::new(RenderModeConfig::default());
        assert_eq!(m.viewport_changed(&view(500.0, 1.0), Time(0.0)), None);
        assert_eq!(m.viewport_changed(&view(501.0, 1.002), Time(0.01)), None);
        assert_eq!(m.mode(), RenderMode::Static);
    }

    #[test]
    fn zoom_enters_animating_and_debounce_exits() {
        let mut m = RenderModeMachine::new(RenderModeConfig::default());
        m.viewport_changed(&view(500.0, 1.0), Time(0.0));
        assert_eq!(
            m.viewport_changed(&view(500.0, 1.1), Time(0.01)),
            Some(ModeChange {
                from: RenderMode::Static,
                to: RenderMode::Animating,
            })
        );
        assert_eq!(m.settle(Time(0.05)), None);
        // More motion pushes the exit out.
        m.viewport_changed(&view(520.0, 1.1), Time(0.06));
        assert_eq!(m.settle(Time(0.1)), None);
        assert_eq!(m.settle_deadline(), Some(Time(0.06).after(0.08)));
        assert!(m.settle(Time(0.14)).is_some());
        assert_eq!(m.mode(), RenderMode::Static);
        assert!(m.take_crisp());
        assert!(!m.take_crisp());
    }

    #[test]
    fn gestures_and_animations_hold_animating() {
        let mut m = RenderModeMachine::new(RenderModeConfig::default());
        assert!(m.gesture_start(GestureKind::Drag, Time(0.0)).is_some());
        assert!(m.animation_start(Time(0.05)).is_none());
        assert_eq!(m.settle(Time(1.0)), None);
        m.gesture_end(GestureKind::Drag, Time(1.0));
        assert_eq!(m.settle(Time(2.0)), None);
        m.animation_finish(Time(2.0));
        assert_eq!(m.settle(Time(2.05)), None);
        assert!(m.settle(Time(2.08)).is_some());
    }

    #[test]
    fn motion_cancels_a_pending_crisp() {
        let mut m = RenderModeMachine::new(RenderModeConfig::default());
        m.animation_start(Time(0.0));
        m.animation_finish(Time(0.0));
        assert!(m.settle(Time(0.1)).is_some());
        m.animation_start(Time(0.1));
        assert!(!m.take_crisp());
    }
}
