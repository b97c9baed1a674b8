use foundation::bounds::Aabb2;
use foundation::time::Time;
use runtime::frame::Frame;
use serde::{Deserialize, Serialize};
use streaming::cache::{DEFAULT_ACCESS_RECORD_TTL_S, DeepCleanReport, SweepParams, SweepReport};
use streaming::pipeline::{Pipeline, PipelineStats};
use tracing::{debug, info};

use crate::policy::PressurePolicy;
use crate::pressure::{PressureLevel, PressureThresholds};
use crate::profile::DeviceProfile;
use crate::telemetry::{MemorySample, PerformanceSnapshot, Telemetry, TelemetryConfig};

/// Cross-component reads the resource manager needs, handed in per tick
/// instead of being looked up globally.
pub trait ResourceContext {
    /// Stamped onto the performance snapshot.
    fn now(&self) -> Time;
    /// `None` when the host cannot measure its heap.
    fn memory(&self) -> Option<MemorySample>;
    fn tile_stats(&self) -> PipelineStats;
    fn profile(&self) -> &DeviceProfile;
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub metrics_interval_s: f64,
    pub deep_cleanup_interval_s: f64,
    pub access_record_ttl_s: f64,
    pub thresholds: PressureThresholds,
    pub telemetry: TelemetryConfig,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            metrics_interval_s: 0.5,
            deep_cleanup_interval_s: 60.0,
            access_record_ttl_s: DEFAULT_ACCESS_RECORD_TTL_S,
            thresholds: PressureThresholds::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// One instruction for the renderer, the pipeline or the timers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum Actuation {
    SetCacheCapacity(usize),
    SetMaxConcurrentLoads(usize),
    SetBlendTime(f64),
    RescheduleCleanup(f64),
    CleanupNow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelChange {
    pub from: PressureLevel,
    pub to: PressureLevel,
    pub forced: bool,
    pub actuations: Vec<Actuation>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    pub sweeps: u64,
    pub deep_cleans: u64,
    pub tiles_evicted: u64,
    pub level_changes: u64,
}

/// Closed loop from frame telemetry to tile-cache actuation.
///
/// The active [`PressurePolicy`] is always `PressurePolicy::for_level` of the
/// current level; only [`ResourceManager::force_level`] bypasses the
/// classifier.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    config: ResourceConfig,
    profile: DeviceProfile,
    telemetry: Telemetry,
    level: PressureLevel,
    forced: Option<PressureLevel>,
    policy: PressurePolicy,
    stats: ResourceStats,
}

impl ResourceManager {
    pub fn new(config: ResourceConfig, profile: DeviceProfile) -> Self {
        Self {
            telemetry: Telemetry::new(config.telemetry),
            level: PressureLevel::Normal,
            forced: None,
            policy: PressurePolicy::for_level(PressureLevel::Normal, &profile),
            stats: ResourceStats::default(),
            config,
            profile,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn level(&self) -> PressureLevel {
        self.level
    }

    pub fn forced_level(&self) -> Option<PressureLevel> {
        self.forced
    }

    pub fn policy(&self) -> &PressurePolicy {
        &self.policy
    }

    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    pub fn last_snapshot(&self) -> Option<PerformanceSnapshot> {
        self.telemetry.last_snapshot()
    }

    pub fn instant_fps(&self) -> Option<f64> {
        self.telemetry.instant_fps()
    }

    /// Actuations that bring a fresh renderer in line with the current policy.
    pub fn initial_actuations(&self) -> Vec<Actuation> {
        policy_actuations(&self.policy, false)
    }

    pub fn record_frame(&mut self, now: Time) -> Frame {
        self.telemetry.record_frame(now)
    }

    /// Aggregation tick: snapshot the window, classify, and switch level if
    /// the classification changed (unless a level is forced).
    pub fn aggregate(
        &mut self,
        ctx: &impl ResourceContext,
    ) -> (PerformanceSnapshot, Option<LevelChange>) {
        let tiles = ctx.tile_stats();
        let memory = if ctx.profile().heap_metrics {
            ctx.memory()
        } else {
            None
        };
        let snap = self
            .telemetry
            .aggregate(ctx.now(), memory, tiles.visible_tiles, tiles.cached_tiles);
        if self.forced.is_some() {
            return (snap, None);
        }
        let level = self.config.thresholds.classify(&snap);
        let change = self.switch_to(level, false);
        if let Some(change) = &change {
            info!(
                "memory pressure {} -> {} (fps {:.1}, score {:.0}, memory {:?})",
                change.from, change.to, snap.avg_fps, snap.score, snap.memory_ratio
            );
        }
        (snap, change)
    }

    /// Pins a level (`Some`) or returns to automatic classification (`None`).
    pub fn force_level(&mut self, level: Option<PressureLevel>) -> Option<LevelChange> {
        self.forced = level;
        let target = match level {
            Some(level) => level,
            None => self
                .telemetry
                .last_snapshot()
                .map(|snap| self.config.thresholds.classify(&snap))
                .unwrap_or(PressureLevel::Normal),
        };
        let change = self.switch_to(target, level.is_some());
        if let Some(change) = &change {
            info!("memory pressure {} -> {} (manual)", change.from, change.to);
        }
        change
    }

    pub fn sweep_params(&self, viewport: &Aabb2) -> SweepParams {
        SweepParams {
            max_age_s: self.policy.max_tile_age_s,
            keep_region: viewport.scaled(self.policy.keep_region_scale),
            capacity: self.policy.cache_capacity,
        }
    }

    pub fn run_sweep(&mut self, pipeline: &mut Pipeline, viewport: &Aabb2, now: Time) -> SweepReport {
        let report = pipeline.sweep(now, &self.sweep_params(viewport));
        self.stats.sweeps += 1;
        self.stats.tiles_evicted += report.len() as u64;
        report
    }

    pub fn run_deep_clean(&mut self, pipeline: &mut Pipeline, now: Time) -> DeepCleanReport {
        let report = pipeline.deep_clean(now, self.config.access_record_ttl_s);
        self.stats.deep_cleans += 1;
        self.stats.tiles_evicted += report.evicted.len() as u64;
        report
    }

    fn switch_to(&mut self, level: PressureLevel, forced: bool) -> Option<LevelChange> {
        if level == self.level {
            return None;
        }
        let from = self.level;
        self.level = level;
        self.policy = PressurePolicy::for_level(level, &self.profile);
        self.stats.level_changes += 1;
        debug!("applying {level} policy: {:?}", self.policy);
        Some(LevelChange {
            from,
            to: level,
            forced,
            actuations: policy_actuations(&self.policy, self.policy.immediate_cleanup),
        })
    }
}

fn policy_actuations(policy: &PressurePolicy, cleanup_now: bool) -> Vec<Actuation> {
    let mut out = vec![
        Actuation::SetCacheCapacity(policy.cache_capacity),
        Actuation::RescheduleCleanup(policy.cleanup_interval_s),
        Actuation::SetMaxConcurrentLoads(policy.max_concurrent_loads),
        Actuation::SetBlendTime(policy.blend_time_s),
    ];
    if cleanup_now {
        out.push(Actuation::CleanupNow);
    }
    out
}
