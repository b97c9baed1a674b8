use adaptive::{DeviceProfile, MemorySample, ResourceContext};
use foundation::time::Time;
use streaming::pipeline::PipelineStats;

/// The reads the resource manager needs, captured once per tick.
///
/// Built from the engine's own state, so the manager never holds references
/// into the pipeline or the host.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    pub now: Time,
    pub memory: Option<MemorySample>,
    pub tiles: PipelineStats,
    pub profile: &'a DeviceProfile,
}

impl ResourceContext for EngineContext<'_> {
    fn now(&self) -> Time {
        self.now
    }

    fn memory(&self) -> Option<MemorySample> {
        self.memory
    }

    fn tile_stats(&self) -> PipelineStats {
        self.tiles
    }

    fn profile(&self) -> &DeviceProfile {
        self.profile
    }
}
