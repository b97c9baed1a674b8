use foundation::time::Time;
use runtime::frame::{DEFAULT_FRAME_WINDOW, Frame, FrameTimer};
use serde::{Deserialize, Serialize};

/// Heap usage as reported by the host, when it can.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    /// `used / limit`, or `None` if the limit is unknown.
    pub fn ratio(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            return None;
        }
        Some(self.used_bytes as f64 / self.limit_bytes as f64)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub fps: f64,
    pub consistency: f64,
    pub memory: f64,
    pub dropped: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fps: 0.4,
            consistency: 0.2,
            memory: 0.25,
            dropped: 0.15,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub target_fps: f64,
    /// Frames slower than this count as dropped.
    pub dropped_frame_ms: f64,
    pub weights: ScoreWeights,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            dropped_frame_ms: 20.0,
            weights: ScoreWeights::default(),
        }
    }
}

/// One aggregation tick's view of frame pacing and memory.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct PerformanceSnapshot {
    pub samples: usize,
    pub avg_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub avg_frame_ms: f64,
    pub dropped_frames: usize,
    pub heap_used_bytes: Option<u64>,
    pub heap_limit_bytes: Option<u64>,
    pub memory_ratio: Option<f64>,
    pub visible_tiles: usize,
    pub cached_tiles: usize,
    /// Composite 0..=100.
    pub score: f64,
    /// Clock time of the aggregation tick, in seconds.
    pub taken_at_s: f64,
}

/// Aggregates a window of frame intervals (seconds) into a snapshot.
///
/// With no memory data the memory weight is spread over the other factors
/// in proportion, so the score stays on the same 0..=100 scale.
pub fn aggregate(
    config: &TelemetryConfig,
    intervals_s: &[f64],
    memory: Option<MemorySample>,
    visible_tiles: usize,
    cached_tiles: usize,
) -> PerformanceSnapshot {
    let memory_ratio = memory.and_then(|m| m.ratio()).map(|r| r.clamp(0.0, 1.0));
    let mut snap = PerformanceSnapshot {
        samples: intervals_s.len(),
        heap_used_bytes: memory.map(|m| m.used_bytes),
        heap_limit_bytes: memory.map(|m| m.limit_bytes).filter(|l| *l > 0),
        memory_ratio,
        visible_tiles,
        cached_tiles,
        ..PerformanceSnapshot::default()
    };

    let frames: Vec<f64> = intervals_s
        .iter()
        .copied()
        .filter(|dt| dt.is_finite() && *dt > 0.0)
        .collect();
    if frames.is_empty() {
        snap.score = memory_ratio.map_or(100.0, |r| 100.0 * (1.0 - r));
        return snap;
    }

    let n = frames.len() as f64;
    let mean_dt = frames.iter().sum::<f64>() / n;
    let min_dt = frames.iter().copied().fold(f64::INFINITY, f64::min);
    let max_dt = frames.iter().copied().fold(0.0, f64::max);
    let dropped_s = config.dropped_frame_ms / 1000.0;

    snap.avg_frame_ms = mean_dt * 1000.0;
    snap.avg_fps = 1.0 / mean_dt;
    snap.max_fps = 1.0 / min_dt;
    snap.min_fps = 1.0 / max_dt;
    snap.dropped_frames = frames.iter().filter(|dt| **dt > dropped_s).count();

    let fps_ratio = if config.target_fps > 0.0 {
        (snap.avg_fps / config.target_fps).min(1.0)
    } else {
        1.0
    };
    let variance = frames.iter().map(|dt| (dt - mean_dt).powi(2)).sum::<f64>() / n;
    let consistency = 1.0 - (variance.sqrt() / mean_dt).min(1.0);
    let dropped = 1.0 - snap.dropped_frames as f64 / n;

    let w = config.weights;
    let mut weighted = w.fps * fps_ratio + w.consistency * consistency + w.dropped * dropped;
    let mut total = w.fps + w.consistency + w.dropped;
    if let Some(ratio) = memory_ratio {
        weighted += w.memory * (1.0 - ratio);
        total += w.memory;
    }
    snap.score = if total > 0.0 {
        (100.0 * weighted / total).clamp(0.0, 100.0)
    } else {
        100.0
    };
    snap
}

/// Frame-interval ring plus the latest aggregated snapshot.
#[derive(Debug, Clone)]
pub struct Telemetry {
    config: TelemetryConfig,
    frames: FrameTimer,
    last: Option<PerformanceSnapshot>,
}

impl Telemetry {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            frames: FrameTimer::new(DEFAULT_FRAME_WINDOW),
            last: None,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn record_frame(&mut self, now: Time) -> Frame {
        self.frames.record(now)
    }

    pub fn instant_fps(&self) -> Option<f64> {
        self.frames.instant_fps()
    }

    pub fn aggregate(
        &mut self,
        now: Time,
        memory: Option<MemorySample>,
        visible_tiles: usize,
        cached_tiles: usize,
    ) -> PerformanceSnapshot {
        let mut snap = aggregate(
            &self.config,
            self.frames.intervals(),
            memory,
            visible_tiles,
            cached_tiles,
        );
        snap.taken_at_s = now.0;
        self.last = Some(snap);
        snap
    }

    pub fn last_snapshot(&self) -> Option<PerformanceSnapshot> {
        self.last
    }

    pub fn reset(&mut self) {
        self.frames.reset();
        self.last = None;
    }
}
