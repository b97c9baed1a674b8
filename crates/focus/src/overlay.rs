//! The focus overlay: one selected hotspot, a darkening layer with the
//! hotspot cut out, and a score deciding when the selection lapses.
//!
//! Ordering contract:
//! - `update` is throttled to the profile's rate; a throttled call changes
//!   nothing.
//! - Auto-deselect is checked after the score is eased, so the frame that
//!   deselects never renders.

use foundation::time::Time;
use scene::{HotspotHandle, HotspotSet, ViewportState};
use tracing::debug;

use crate::cutout::{Cutout, InverseMask, inverse_mask};
use crate::profile::FocusProfile;
use crate::session::{DeselectReason, FocusEvaluation, FocusSession};
use crate::spring::SpringRect;
use crate::transition::{SwitchKind, SwitchTransition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusError {
    /// The handle is stale or out of range for the live dataset.
    UnknownHotspot(HotspotHandle),
}

impl std::fmt::Display for FocusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusError::UnknownHotspot(h) => write!(f, "unknown hotspot {h:?}"),
        }
    }
}

impl std::error::Error for FocusError {}

/// Result of `FocusOverlay::select`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Selected {
    pub handle: HotspotHandle,
    /// Selection that was replaced, if any.
    pub replaced: Option<HotspotHandle>,
    pub switch: Option<SwitchKind>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Deselection {
    pub handle: HotspotHandle,
    pub reason: DeselectReason,
}

/// Everything the host needs to draw the overlay for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub handle: HotspotHandle,
    /// `base_opacity × score`, times the switch fade if one is running.
    pub opacity: f64,
    pub score: f64,
    pub cutouts: Vec<Cutout>,
    pub mask: InverseMask,
    pub switching: Option<SwitchKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FocusUpdate {
    /// Nothing is selected.
    Inactive,
    /// Called again before the update interval elapsed.
    Throttled,
    Frame(OverlayFrame),
    Deselected(Deselection),
}

#[derive(Debug, Clone)]
pub struct FocusOverlay {
    profile: FocusProfile,
    session: Option<FocusSession>,
    spring: SpringRect,
    transition: Option<SwitchTransition>,
    last_update: Option<Time>,
    last_cutout: Option<Cutout>,
}

impl FocusOverlay {
    pub fn new(profile: FocusProfile) -> Self {
        Self {
            spring: SpringRect::new(profile.spring_stiffness, profile.spring_mass),
            profile,
            session: None,
            transition: None,
            last_update: None,
            last_cutout: None,
        }
    }

    pub fn profile(&self) -> &FocusProfile {
        &self.profile
    }

    pub fn session(&self) -> Option<&FocusSession> {
        self.session.as_ref()
    }

    pub fn selected(&self) -> Option<HotspotHandle> {
        self.session.as_ref().map(|s| s.selected)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn score(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.current_score)
    }

    pub fn last_evaluation(&self) -> Option<&FocusEvaluation> {
        self.session.as_ref().and_then(FocusSession::last_evaluation)
    }

    /// Selects `handle`, capturing the current viewport as the reference.
    ///
    /// Re-selecting the active hotspot is a no-op. Replacing another
    /// selection starts a switch transition from its last drawn cutout.
    pub fn select(
        &mut self,
        set: &HotspotSet,
        handle: HotspotHandle,
        viewport: &ViewportState,
        now: Time,
    ) -> Result<Selected, FocusError> {
        let hotspot = set.get(handle).ok_or(FocusError::UnknownHotspot(handle))?;
        if self.selected() == Some(handle) {
            return Ok(Selected {
                handle,
                replaced: None,
                switch: None,
            });
        }

        let replaced = self.selected();
        let mut switch = None;
        if let Some(prev) = replaced
            && let Some(from) = self.outgoing_cutout(set, prev, viewport)
        {
            let from_center = from.bounds.center();
            let to_center = viewport.image_to_screen(hotspot.center());
            let screen_view = ViewportState::new(
                viewport.screen_rect(),
                viewport.zoom,
                viewport.container_size_px,
            );
            let kind = SwitchKind::choose(
                from_center,
                to_center,
                &screen_view,
                self.profile.close_switch_fraction,
            );
            self.transition = Some(SwitchTransition::new(
                kind,
                from,
                now,
                self.profile.switch_duration_s,
            ));
            switch = Some(kind);
        } else {
            self.transition = None;
        }

        debug!(?handle, id = hotspot.id(), ?replaced, ?switch, "hotspot selected");
        self.session = Some(FocusSession::begin(handle, &hotspot.bbox(), viewport, now));
        self.spring.reset();
        self.last_update = None;
        Ok(Selected {
            handle,
            replaced,
            switch,
        })
    }

    fn outgoing_cutout(
        &self,
        set: &HotspotSet,
        prev: HotspotHandle,
        viewport: &ViewportState,
    ) -> Option<Cutout> {
        if let Some(c) = &self.last_cutout
            && c.handle == prev
        {
            return Some(c.clone());
        }
        let hotspot = set.get(prev)?;
        Some(Cutout::project(prev, hotspot, viewport)?.with_min_size(self.profile.min_cutout_px))
    }

    /// Clears the selection, if any.
    pub fn deselect(&mut self, reason: DeselectReason) -> Option<Deselection> {
        let session = self.session.take()?;
        self.transition = None;
        self.last_update = None;
        self.last_cutout = None;
        self.spring.reset();
        debug!(handle = ?session.selected, %reason, "hotspot deselected");
        Some(Deselection {
            handle: session.selected,
            reason,
        })
    }

    /// Re-scores the selection and builds the overlay frame.
    ///
    /// While the camera animates the cutout snaps to the hotspot instead of
    /// springing after it.
    pub fn update(
        &mut self,
        set: &HotspotSet,
        viewport: &ViewportState,
        animating: bool,
        now: Time,
    ) -> FocusUpdate {
        let Some(session) = self.session.as_mut() else {
            return FocusUpdate::Inactive;
        };
        let dt = match self.last_update {
            Some(last) => {
                let dt = now.since(last);
                if dt < self.profile.update_interval_s() - 1e-9 {
                    return FocusUpdate::Throttled;
                }
                dt
            }
            None => 0.0,
        };
        self.last_update = Some(now);

        let handle = session.selected;
        let Some(hotspot) = set.get(handle) else {
            return self.deselected(DeselectReason::HotspotRemoved);
        };
        let eval = session.evaluate(&self.profile, viewport, &hotspot.bbox());
        if let Some(reason) = session.deselect_reason(&self.profile, &eval, now) {
            return self.deselected(reason);
        }
        let score = session.current_score;

        let Some(target) = Cutout::project(handle, hotspot, viewport) else {
            return self.deselected(DeselectReason::HotspotRemoved);
        };
        let target = target.with_min_size(self.profile.min_cutout_px);
        let cutout = if animating {
            self.spring.snap(&target.bounds);
            target
        } else {
            let bounds = self.spring.follow(&target.bounds, dt);
            target.fitted_to(&bounds)
        };

        let mut opacity_factor = 1.0;
        let mut switching = None;
        let mut shown = cutout.clone();
        if let Some(sw) = &self.transition {
            if sw.is_finished(now) {
                self.transition = None;
            } else {
                let f = sw.frame(&cutout, now);
                opacity_factor = f.opacity_factor;
                shown = f.cutout;
                switching = Some(sw.kind);
            }
        }
        self.last_cutout = Some(cutout);

        let cutouts = vec![shown];
        let mask = inverse_mask(&viewport.screen_rect(), &cutouts);
        FocusUpdate::Frame(OverlayFrame {
            handle,
            opacity: (self.profile.base_opacity * score * opacity_factor).clamp(0.0, 1.0),
            score,
            cutouts,
            mask,
            switching,
        })
    }

    fn deselected(&mut self, reason: DeselectReason) -> FocusUpdate {
        match self.deselect(reason) {
            Some(d) => FocusUpdate::Deselected(d),
            None => FocusUpdate::Inactive,
        }
    }

    /// Drops the selection without a reason event; used when the engine
    /// shuts down.
    pub fn reset(&mut self) {
        self.session = None;
        self.transition = None;
        self.last_update = None;
        self.last_cutout = None;
        self.spring.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::{FocusError, FocusOverlay, FocusUpdate, OverlayFrame};
    use crate::profile::FocusProfile;
    use crate::session::DeselectReason;
    use crate::transition::SwitchKind;
    use foundation::handles::Handle;
    use foundation::math::Vec2;
    use foundation::time::Time;
    use scene::{HotspotHandle, HotspotKind, HotspotRecord, HotspotSet, Shape, ViewportState};

    const DT: f64 = 1.0 / 60.0;

    fn square(id: &str, x: f64, y: f64, size: f64) -> HotspotRecord {
        HotspotRecord {
            id: id.to_string(),
            kind: HotspotKind::AudioOnly,
            shape: Shape::Polygon,
            rings: vec![vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]],
            title: None,
            audio_url: None,
            image_url: None,
            link_url: None,
        }
    }

    fn dataset() -> HotspotSet {
        HotspotSet::load(
            vec![
                square("a", 1950.0, 1950.0, 100.0),
                square("b", 2060.0, 1950.0, 100.0),
                square("far", 3500.0, 3500.0, 100.0),
            ],
            1,
        )
        .0
    }

    fn view(zoom: f64) -> ViewportState {
        ViewportState::centered(Vec2::new(2000.0, 2000.0), zoom, Vec2::new(800.0, 600.0), 4000.0)
    }

    fn handle(set: &HotspotSet, id: &str) -> HotspotHandle {
        set.handle_of(id).unwrap()
    }

    fn frame(u: FocusUpdate) -> OverlayFrame {
        match u {
            FocusUpdate::Frame(f) => f,
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    #[test]
    fn fresh_selection_draws_at_full_opacity() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        o.select(&set, handle(&set, "a"), &view(4.0), Time::ZERO).unwrap();
        let f = frame(o.update(&set, &view(4.0), false, Time::ZERO));
        assert_eq!(f.score, 1.0);
        assert_eq!(f.opacity, 0.6);
        assert_eq!(f.cutouts.len(), 1);
        assert!(!f.mask.is_empty());
    }

    #[test]
    fn zooming_out_four_to_one_deselects_after_grace() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        let a = handle(&set, "a");
        o.select(&set, a, &view(4.0), Time::ZERO).unwrap();

        let mut t = 0.0;
        let mut deselected_at = None;
        while t < 2.0 {
            t += DT;
            match o.update(&set, &view(1.0), true, Time(t)) {
                FocusUpdate::Frame(f) => {
                    assert!(t < 1.2, "still selected at {t}");
                    assert_eq!(o.last_evaluation().unwrap().sub_scores.zoom, 0.0);
                    assert!(f.score < 1.0);
                }
                FocusUpdate::Deselected(d) => {
                    assert_eq!(d.handle, a);
                    assert_eq!(d.reason, DeselectReason::ZoomedOut);
                    deselected_at = Some(t);
                    break;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        let at = deselected_at.unwrap();
        assert!((1.2..1.2 + 2.0 * DT).contains(&at), "deselected at {at}");
        assert!(!o.is_active());
        assert_eq!(o.update(&set, &view(1.0), false, Time(3.0)), FocusUpdate::Inactive);
    }

    #[test]
    fn returning_to_the_reference_restores_full_score() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        o.select(&set, handle(&set, "a"), &view(2.0), Time::ZERO).unwrap();
        let mut t = 0.0;
        for _ in 0..10 {
            t += DT;
            frame(o.update(&set, &view(1.5), false, Time(t)));
        }
        assert!(o.score().unwrap() < 1.0);
        for _ in 0..60 {
            t += DT;
            frame(o.update(&set, &view(2.0), false, Time(t)));
        }
        assert_eq!(o.score(), Some(1.0));
    }

    #[test]
    fn updates_are_throttled() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        o.select(&set, handle(&set, "a"), &view(4.0), Time::ZERO).unwrap();
        frame(o.update(&set, &view(4.0), false, Time::ZERO));
        assert_eq!(o.update(&set, &view(4.0), false, Time(0.005)), FocusUpdate::Throttled);
        frame(o.update(&set, &view(4.0), false, Time(DT)));
    }

    #[test]
    fn switching_picks_fade_or_morph_by_distance() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        let v = view(1.0);
        o.select(&set, handle(&set, "a"), &v, Time::ZERO).unwrap();
        frame(o.update(&set, &v, false, Time::ZERO));

        let near = o.select(&set, handle(&set, "b"), &v, Time(0.1)).unwrap();
        assert_eq!(near.replaced, Some(handle(&set, "a")));
        assert_eq!(near.switch, Some(SwitchKind::FadeOutIn));
        let mid = frame(o.update(&set, &v, false, Time(0.6)));
        assert_eq!(mid.switching, Some(SwitchKind::FadeOutIn));
        assert!(mid.opacity < 0.01);

        let far = o.select(&set, handle(&set, "far"), &v, Time(0.7)).unwrap();
        assert_eq!(far.switch, Some(SwitchKind::Morph));
        let done = frame(o.update(&set, &v, false, Time(1.8)));
        assert_eq!(done.switching, None);
    }

    #[test]
    fn stale_handles_are_rejected_and_drop_the_selection() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        let stale = Handle::new(0, 99);
        assert_eq!(
            o.select(&set, stale, &view(4.0), Time::ZERO),
            Err(FocusError::UnknownHotspot(stale))
        );

        o.select(&set, handle(&set, "a"), &view(4.0), Time::ZERO).unwrap();
        let reloaded = HotspotSet::load(vec![square("a", 0.0, 0.0, 10.0)], 2).0;
        match o.update(&reloaded, &view(4.0), false, Time(DT)) {
            FocusUpdate::Deselected(d) => assert_eq!(d.reason, DeselectReason::HotspotRemoved),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reselecting_the_same_hotspot_keeps_the_reference() {
        let set = dataset();
        let mut o = FocusOverlay::new(FocusProfile::default());
        let a = handle(&set, "a");
        o.select(&set, a, &view(4.0), Time::ZERO).unwrap();
        let again = o.select(&set, a, &view(2.0), Time(0.5)).unwrap();
        assert_eq!(again.replaced, None);
        assert_eq!(o.session().unwrap().reference.zoom, 4.0);
    }
}
