use adaptive::{DeviceProfile, PressureLevel, PressurePolicy, ResourceConfig};
use focus::FocusProfile;
use scene::{
    DEFAULT_ATTACH_BATCH_SIZE, DEFAULT_BOUNDS_QUANTUM, DEFAULT_QUERY_CACHE_TTL_S,
    DEFAULT_VISIBILITY_DEBOUNCE_S, DEFAULT_VISIBILITY_PADDING, PickOptions, QueryOptions,
    VisibilityOptions,
};
use serde::{Deserialize, Serialize};
use streaming::pipeline::PipelineConfig;

use crate::render_mode::RenderModeConfig;

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "failed to parse engine config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid engine config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub query_cache_ttl_s: f64,
    pub bounds_quantum: f64,
    /// Points this close to an edge (image units) count as inside.
    pub edge_tolerance: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            query_cache_ttl_s: DEFAULT_QUERY_CACHE_TTL_S,
            bounds_quantum: DEFAULT_BOUNDS_QUANTUM,
            edge_tolerance: 0.0,
        }
    }
}

impl SpatialConfig {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            cache_ttl_s: self.query_cache_ttl_s,
            bounds_quantum: self.bounds_quantum,
            pick: PickOptions {
                edge_tolerance: self.edge_tolerance,
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    pub padding: f64,
    pub debounce_s: f64,
    pub attach_batch_size: u32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_VISIBILITY_PADDING,
            debounce_s: DEFAULT_VISIBILITY_DEBOUNCE_S,
            attach_batch_size: DEFAULT_ATTACH_BATCH_SIZE,
        }
    }
}

impl CullingConfig {
    pub fn visibility_options(&self) -> VisibilityOptions {
        VisibilityOptions {
            padding: self.padding,
            debounce_s: self.debounce_s,
            attach_batch_size: self.attach_batch_size,
        }
    }
}

/// Every engine tunable. Missing JSON fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub spatial: SpatialConfig,
    pub culling: CullingConfig,
    pub render_mode: RenderModeConfig,
    pub resources: ResourceConfig,
    pub pipeline: PipelineConfig,
    pub focus: FocusProfile,
    /// Keep a drainable log of engine events besides notifying subscribers.
    pub record_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spatial: SpatialConfig::default(),
            culling: CullingConfig::default(),
            render_mode: RenderModeConfig::default(),
            resources: ResourceConfig::default(),
            pipeline: PipelineConfig::default(),
            focus: FocusProfile::default(),
            record_events: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults adjusted for the probed device.
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        let mut config = Self::default();
        config.focus = FocusProfile::for_device(profile.touch);
        let normal = PressurePolicy::for_level(PressureLevel::Normal, profile);
        config.pipeline.initial_capacity = normal.cache_capacity;
        config.pipeline.queue.max_concurrency =
            config.pipeline.queue.max_concurrency.min(normal.max_concurrent_loads);
        config.pipeline.queue.initial_concurrency = config
            .pipeline
            .queue
            .initial_concurrency
            .min(config.pipeline.queue.max_concurrency);
        if profile.is_mobile() {
            config.culling.attach_batch_size = (DEFAULT_ATTACH_BATCH_SIZE / 2).max(1);
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.spatial.query_cache_ttl_s.is_nan() || self.spatial.query_cache_ttl_s < 0.0 {
            return invalid("spatial.query_cache_ttl_s must be >= 0");
        }
        if self.culling.attach_batch_size == 0 {
            return invalid("culling.attach_batch_size must be > 0");
        }
        if self.resources.metrics_interval_s.is_nan() || self.resources.metrics_interval_s <= 0.0 {
            return invalid("resources.metrics_interval_s must be > 0");
        }
        if self.focus.zoom_fade_end > self.focus.zoom_fade_start {
            return invalid("focus.zoom_fade_end must not exceed focus.zoom_fade_start");
        }
        let q = &self.pipeline.queue;
        if q.min_concurrency == 0 || q.min_concurrency > q.max_concurrency {
            return invalid("pipeline.queue concurrency bounds are inconsistent");
        }
        Ok(())
    }
}
