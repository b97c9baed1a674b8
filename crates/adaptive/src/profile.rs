use serde::{Deserialize, Serialize};

/// Raw facts the host reports once at startup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    pub touch: bool,
    pub screen_width_px: f64,
    pub screen_height_px: f64,
    pub device_pixel_ratio: f64,
    pub device_memory_gb: Option<f64>,
    pub hardware_concurrency: Option<u32>,
    /// Whether heap usage can be sampled at runtime.
    pub heap_metrics: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Tablet,
    Mobile,
}

/// Immutable device description produced by [`DeviceProfile::probe`].
///
/// Everything downstream branches on these values, never on the host.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub touch: bool,
    pub low_memory: bool,
    pub heap_metrics: bool,
    /// Multiplier applied to per-level tile cache capacities.
    pub capacity_scale: f64,
    /// Multiplier applied to per-level load concurrency ceilings.
    pub concurrency_scale: f64,
}

const MOBILE_MAX_SHORT_SIDE_PX: f64 = 600.0;
const TABLET_MAX_SHORT_SIDE_PX: f64 = 1100.0;
const LOW_MEMORY_GB: f64 = 2.0;

impl DeviceProfile {
    pub fn probe(caps: &HostCapabilities) -> Self {
        let short_side = caps.screen_width_px.min(caps.screen_height_px);
        let class = if !caps.touch || short_side <= 0.0 {
            DeviceClass::Desktop
        } else if short_side <= MOBILE_MAX_SHORT_SIDE_PX {
            DeviceClass::Mobile
        } else if short_side <= TABLET_MAX_SHORT_SIDE_PX {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        };
        let low_memory = caps.device_memory_gb.is_some_and(|gb| gb <= LOW_MEMORY_GB);
        let few_cores = caps.hardware_concurrency.is_some_and(|n| n <= 2);

        let mut capacity_scale: f64 = match class {
            DeviceClass::Desktop => 1.0,
            DeviceClass::Tablet => 0.75,
            DeviceClass::Mobile => 0.5,
        };
        if low_memory {
            capacity_scale *= 0.5;
        }
        let mut concurrency_scale: f64 = match class {
            DeviceClass::Desktop => 1.0,
            DeviceClass::Tablet | DeviceClass::Mobile => 0.75,
        };
        if few_cores {
            concurrency_scale *= 0.5;
        }

        Self {
            class,
            touch: caps.touch,
            low_memory,
            heap_metrics: caps.heap_metrics,
            capacity_scale,
            concurrency_scale,
        }
    }

    pub fn desktop() -> Self {
        Self::probe(&HostCapabilities {
            screen_width_px: 1920.0,
            screen_height_px: 1080.0,
            device_pixel_ratio: 1.0,
            ..HostCapabilities::default()
        })
    }

    pub fn is_mobile(&self) -> bool {
        self.class == DeviceClass::Mobile
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceClass, DeviceProfile, HostCapabilities};

    fn touch_screen(w: f64, h: f64) -> HostCapabilities {
        HostCapabilities {
            touch: true,
            screen_width_px: w,
            screen_height_px: h,
            device_pixel_ratio: 2.0,
            ..HostCapabilities::default()
        }
    }

    #[test]
    fn classifies_by_touch_and_screen() {
        assert_eq!(DeviceProfile::desktop().class, DeviceClass::Desktop);
        assert_eq!(DeviceProfile::probe(&touch_screen(390.0, 844.0)).class, DeviceClass::Mobile);
        assert_eq!(DeviceProfile::probe(&touch_screen(1024.0, 1366.0)).class, DeviceClass::Tablet);
        assert_eq!(DeviceProfile::probe(&touch_screen(1920.0, 1200.0)).class, DeviceClass::Desktop);
    }

    #[test]
    fn low_memory_shrinks_capacity() {
        let mut caps = touch_screen(390.0, 844.0);
        assert_eq!(DeviceProfile::probe(&caps).capacity_scale, 0.5);
        caps.device_memory_gb = Some(1.0);
        caps.hardware_concurrency = Some(2);
        let p = DeviceProfile::probe(&caps);
        assert!(p.low_memory);
        assert_eq!(p.capacity_scale, 0.25);
        assert_eq!(p.concurrency_scale, 0.375);
    }
}
