use foundation::math::precision::stable_total_cmp_f64;
use foundation::time::Time;
use runtime::FrameBudget;
use tracing::debug;

use crate::hotspot::HotspotHandle;
use crate::query::HotspotIndex;
use crate::selection::SelectionSet;
use crate::viewport::ViewportState;

pub const DEFAULT_VISIBILITY_PADDING: f64 = 0.2;
pub const DEFAULT_VISIBILITY_DEBOUNCE_S: f64 = 0.024;
pub const DEFAULT_ATTACH_BATCH_SIZE: u32 = 50;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VisibilityOptions {
    /// Fraction of the viewport extent added on every side before querying.
    pub padding: f64,
    pub debounce_s: f64,
    /// Hotspots attached per frame after a load.
    pub attach_batch_size: u32,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            padding: DEFAULT_VISIBILITY_PADDING,
            debounce_s: DEFAULT_VISIBILITY_DEBOUNCE_S,
            attach_batch_size: DEFAULT_ATTACH_BATCH_SIZE,
        }
    }
}

/// Membership changes produced by one recompute.
///
/// Ordering contract:
/// - `entered` and `exited` are ascending by handle index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub entered: Vec<HotspotHandle>,
    pub exited: Vec<HotspotHandle>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Tracks which hotspots are near the viewport.
///
/// Camera changes only arm a debounce deadline; the recompute itself runs
/// once the deadline passes, so a burst of pan updates costs one query.
/// After a load, hotspots are attached a batch per frame and only attached
/// hotspots take part in culling.
#[derive(Debug, Clone)]
pub struct VisibilityCuller {
    options: VisibilityOptions,
    generation: u32,
    total: u32,
    attached: SelectionSet,
    attach_cursor: u32,
    visible: SelectionSet,
    prioritized: Vec<HotspotHandle>,
    deadline: Option<Time>,
}

impl VisibilityCuller {
    pub fn new(options: VisibilityOptions) -> Self {
        Self {
            options,
            generation: 0,
            total: 0,
            attached: SelectionSet::new(),
            attach_cursor: 0,
            visible: SelectionSet::new(),
            prioritized: Vec::new(),
            deadline: None,
        }
    }

    pub fn options(&self) -> VisibilityOptions {
        self.options
    }

    /// Starts attaching a freshly loaded dataset from scratch.
    ///
    /// Everything previously visible is reported as exited.
    pub fn begin_attach(&mut self, index: &HotspotIndex) -> VisibilityDelta {
        let exited = self.visible_handles();
        self.generation = index.set().generation();
        self.total = index.set().len() as u32;
        self.attached.clear();
        self.attach_cursor = 0;
        self.visible.clear();
        self.prioritized.clear();
        VisibilityDelta {
            entered: Vec::new(),
            exited,
        }
    }

    /// Attaches the next batch within `budget` (one unit per hotspot).
    ///
    /// Returns `true` while more hotspots remain to be attached.
    pub fn attach_step(&mut self, budget: &mut FrameBudget) -> bool {
        let mut attached_now = 0;
        while self.attach_cursor < self.total && attached_now < self.options.attach_batch_size {
            if !budget.try_consume(1) {
                break;
            }
            self.attached.insert_index(self.attach_cursor);
            self.attach_cursor += 1;
            attached_now += 1;
        }
        if attached_now > 0 {
            debug!(
                "attached {attached_now} hotspots ({}/{})",
                self.attach_cursor, self.total
            );
        }
        !self.is_fully_attached()
    }

    pub fn is_fully_attached(&self) -> bool {
        self.attach_cursor >= self.total
    }

    pub fn attached_len(&self) -> usize {
        self.attached.len()
    }

    /// Arms (or pushes out) the recompute deadline.
    pub fn viewport_changed(&mut self, now: Time) {
        self.deadline = Some(now.after(self.options.debounce_s));
    }

    pub fn pending_deadline(&self) -> Option<Time> {
        self.deadline
    }

    /// Returns `true` once if the debounce deadline has passed.
    pub fn take_due(&mut self, now: Time) -> bool {
        match self.deadline {
            Some(at) if now.0 >= at.0 => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_pending(&mut self) {
        self.deadline = None;
    }

    /// Queries the padded viewport and diffs against the previous result.
    pub fn recompute(&mut self, index: &mut HotspotIndex, viewport: &ViewportState) -> VisibilityDelta {
        if index.set().generation() != self.generation {
            return VisibilityDelta::default();
        }
        let padded = viewport.padded_bounds(self.options.padding);
        let candidates = index.query_viewport(&padded, viewport.zoom);

        let mut next = SelectionSet::new();
        let mut ranked: Vec<(f64, HotspotHandle)> = Vec::with_capacity(candidates.len());
        for &handle in candidates.iter() {
            if !self.attached.contains(handle) {
                continue;
            }
            let Some(hotspot) = index.get(handle) else {
                continue;
            };
            next.insert_index(handle.index());
            ranked.push((hotspot.center().distance(viewport.center), handle));
        }
        ranked.sort_by(|a, b| {
            stable_total_cmp_f64(a.0, b.0).then_with(|| a.1.index().cmp(&b.1.index()))
        });

        let delta = VisibilityDelta {
            entered: self.to_handles(next.difference(&self.visible)),
            exited: self.to_handles(self.visible.difference(&next)),
        };
        self.visible = next;
        self.prioritized = ranked.into_iter().map(|(_, h)| h).collect();
        delta
    }

    pub fn is_visible(&self, handle: HotspotHandle) -> bool {
        handle.is_from(self.generation) && self.visible.contains(handle)
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Visible hotspots, ascending by index.
    pub fn visible_handles(&self) -> Vec<HotspotHandle> {
        self.to_handles(self.visible.iter().collect())
    }

    /// Visible hotspots nearest the viewport center first (ties by index).
    pub fn prioritized(&self) -> &[HotspotHandle] {
        &self.prioritized
    }

    /// Forgets all state, including a pending recompute.
    pub fn reset(&mut self) {
        *self = Self::new(self.options);
    }

    fn to_handles(&self, indices: Vec<u32>) -> Vec<HotspotHandle> {
        indices
            .into_iter()
            .map(|i| HotspotHandle::new(i, self.generation))
            .collect()
    }
}
