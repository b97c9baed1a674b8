use serde::Serialize;

use crate::pressure::PressureLevel;
use crate::profile::DeviceProfile;

/// Everything a pressure level decides, already scaled for the device.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PressurePolicy {
    pub level: PressureLevel,
    /// Tiles the renderer may keep cached.
    pub cache_capacity: usize,
    pub cleanup_interval_s: f64,
    pub max_concurrent_loads: usize,
    /// Tile fade-in time handed to the renderer.
    pub blend_time_s: f64,
    /// Tiles idle for longer than this are swept.
    pub max_tile_age_s: f64,
    /// Viewport scale outside of which tiles are swept.
    pub keep_region_scale: f64,
    /// Whether entering this level sweeps immediately.
    pub immediate_cleanup: bool,
}

const MIN_CACHE_CAPACITY: usize = 16;
const MIN_CONCURRENT_LOADS: usize = 1;

impl PressurePolicy {
    pub fn for_level(level: PressureLevel, profile: &DeviceProfile) -> Self {
        let (capacity, cleanup_s, loads, blend_s, max_age_s, keep) = match level {
            PressureLevel::Normal => (400, 30.0, 8, 0.3, 120.0, 2.0),
            PressureLevel::Elevated => (300, 15.0, 6, 0.2, 60.0, 1.75),
            PressureLevel::High => (200, 5.0, 4, 0.1, 30.0, 1.5),
            PressureLevel::Critical => (100, 1.0, 2, 0.0, 10.0, 1.0),
        };
        let cache_capacity =
            ((capacity as f64 * profile.capacity_scale).round() as usize).max(MIN_CACHE_CAPACITY);
        let max_concurrent_loads =
            ((loads as f64 * profile.concurrency_scale).round() as usize).max(MIN_CONCURRENT_LOADS);
        Self {
            level,
            cache_capacity,
            cleanup_interval_s: cleanup_s,
            max_concurrent_loads,
            blend_time_s: blend_s,
            max_tile_age_s: max_age_s,
            keep_region_scale: keep,
            immediate_cleanup: level >= PressureLevel::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PressurePolicy;
    use crate::pressure::PressureLevel;
    use crate::profile::{DeviceProfile, HostCapabilities};

    #[test]
    fn stricter_levels_shrink_everything() {
        let profile = DeviceProfile::desktop();
        let policies: Vec<PressurePolicy> = PressureLevel::ALL
            .iter()
            .map(|l| PressurePolicy::for_level(*l, &profile))
            .collect();
        for pair in policies.windows(2) {
            assert!(pair[1].cache_capacity < pair[0].cache_capacity);
            assert!(pair[1].cleanup_interval_s < pair[0].cleanup_interval_s);
            assert!(pair[1].max_concurrent_loads < pair[0].max_concurrent_loads);
            assert!(pair[1].keep_region_scale < pair[0].keep_region_scale);
        }
        assert_eq!(
            policies.iter().map(|p| p.cleanup_interval_s).collect::<Vec<_>>(),
            vec![30.0, 15.0, 5.0, 1.0]
        );
        assert!(!policies[1].immediate_cleanup);
        assert!(policies[2].immediate_cleanup);
    }

    #[test]
    fn mobile_profile_halves_capacity() {
        let mobile = DeviceProfile::probe(&HostCapabilities {
            touch: true,
            screen_width_px: 390.0,
            screen_height_px: 844.0,
            ..HostCapabilities::default()
        });
        let p = PressurePolicy::for_level(PressureLevel::Normal, &mobile);
        assert_eq!(p.cache_capacity, 200);
        assert_eq!(p.max_concurrent_loads, 6);
    }
}
