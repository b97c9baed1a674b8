use adaptive::PressureLevel;
use focus::{DeselectReason, SwitchKind};
use scene::HotspotHandle;

use crate::render_mode::RenderMode;

/// Notifications for the host UI, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    DatasetLoaded {
        version: String,
        accepted: usize,
        rejected: usize,
    },
    /// The hotspot under the pointer changed.
    HoverChanged {
        hotspot: Option<HotspotHandle>,
        id: Option<String>,
    },
    Selected {
        hotspot: HotspotHandle,
        id: String,
        replaced: Option<HotspotHandle>,
        switch: Option<SwitchKind>,
    },
    Deselected {
        hotspot: HotspotHandle,
        reason: DeselectReason,
    },
    /// Membership of the near-viewport set changed. `prioritized` is the
    /// full visible list, nearest first, for the audio preloader.
    VisibleHotspotsChanged {
        entered: Vec<String>,
        exited: Vec<String>,
        prioritized: Vec<String>,
    },
    PressureChanged {
        from: PressureLevel,
        to: PressureLevel,
        forced: bool,
    },
    RenderModeChanged {
        from: RenderMode,
        to: RenderMode,
    },
    Warning {
        message: String,
    },
}
