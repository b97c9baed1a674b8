use serde::{Deserialize, Serialize};

use crate::telemetry::PerformanceSnapshot;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    #[default]
    Normal,
    Elevated,
    High,
    Critical,
}

impl PressureLevel {
    pub const ALL: [PressureLevel; 4] = [
        PressureLevel::Normal,
        PressureLevel::Elevated,
        PressureLevel::High,
        PressureLevel::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PressureLevel::Normal => "normal",
            PressureLevel::Elevated => "elevated",
            PressureLevel::High => "high",
            PressureLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A level applies when any of its limits is crossed.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelThreshold {
    /// Average FPS strictly below this.
    pub fps_below: f64,
    /// Performance score strictly below this.
    pub score_below: f64,
    /// Heap ratio strictly above this (ignored without memory data).
    pub memory_above: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureThresholds {
    pub elevated: LevelThreshold,
    pub high: LevelThreshold,
    pub critical: LevelThreshold,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            elevated: LevelThreshold {
                fps_below: 45.0,
                score_below: 70.0,
                memory_above: 0.7,
            },
            high: LevelThreshold {
                fps_below: 30.0,
                score_below: 50.0,
                memory_above: 0.8,
            },
            critical: LevelThreshold {
                fps_below: 20.0,
                score_below: 30.0,
                memory_above: 0.9,
            },
        }
    }
}

impl PressureThresholds {
    /// The most severe level whose threshold the snapshot crosses.
    ///
    /// An empty frame window only ever classifies on memory.
    pub fn classify(&self, snap: &PerformanceSnapshot) -> PressureLevel {
        for (level, t) in [
            (PressureLevel::Critical, &self.critical),
            (PressureLevel::High, &self.high),
            (PressureLevel::Elevated, &self.elevated),
        ] {
            if crosses(t, snap) {
                return level;
            }
        }
        PressureLevel::Normal
    }
}

fn crosses(t: &LevelThreshold, snap: &PerformanceSnapshot) -> bool {
    let frame_pressure =
        snap.samples > 0 && (snap.avg_fps < t.fps_below || snap.score < t.score_below);
    let memory_pressure = snap.memory_ratio.is_some_and(|r| r > t.memory_above);
    frame_pressure || memory_pressure
}

#[cfg(test)]
mod tests {
    use super::{PressureLevel, PressureThresholds};
    use crate::telemetry::PerformanceSnapshot;

    fn snap(fps: f64, score: f64, memory: Option<f64>) -> PerformanceSnapshot {
        PerformanceSnapshot {
            samples: 60,
            avg_fps: fps,
            score,
            memory_ratio: memory,
            ..PerformanceSnapshot::default()
        }
    }

    #[test]
    fn most_severe_matching_level_wins() {
        let t = PressureThresholds::default();
        assert_eq!(t.classify(&snap(60.0, 95.0, Some(0.3))), PressureLevel::Normal);
        assert_eq!(t.classify(&snap(40.0, 95.0, None)), PressureLevel::Elevated);
        assert_eq!(t.classify(&snap(60.0, 45.0, None)), PressureLevel::High);
        assert_eq!(t.classify(&snap(60.0, 95.0, Some(0.95))), PressureLevel::Critical);
        assert_eq!(t.classify(&snap(15.0, 95.0, Some(0.75))), PressureLevel::Critical);
    }

    #[test]
    fn without_memory_data_only_frames_count() {
        let t = PressureThresholds::default();
        assert_eq!(t.classify(&snap(58.0, 90.0, None)), PressureLevel::Normal);
        assert_eq!(t.classify(&snap(25.0, 90.0, None)), PressureLevel::High);
    }

    #[test]
    fn empty_window_does_not_raise_pressure() {
        let t = PressureThresholds::default();
        let empty = PerformanceSnapshot::default();
        assert_eq!(t.classify(&empty), PressureLevel::Normal);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(PressureLevel::Normal < PressureLevel::Elevated);
        assert!(PressureLevel::High < PressureLevel::Critical);
        assert_eq!(PressureLevel::High.to_string(), "high");
    }
}
