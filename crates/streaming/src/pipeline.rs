use std::collections::BTreeSet;

use foundation::bounds::Aabb2;
use foundation::time::Time;
use runtime::offload::{Offload, OffloadStats, RequestId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{DeepCleanReport, SweepParams, SweepReport, TileCache};
use crate::queue::{Enqueued, LoadPriority, LoadQueue, LoadQueueConfig, LoadQueueStats};
use crate::residency::ResidencyState;
use crate::tile::{TileKey, TilePyramid};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tiles inside the viewport scaled by this factor are candidates for
    /// predictive loading.
    pub lookahead_scale: f64,
    pub initial_capacity: usize,
    /// `None` prioritizes on the caller's thread.
    pub offload_timeout_s: Option<f64>,
    pub queue: LoadQueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookahead_scale: 2.0,
            initial_capacity: 400,
            offload_timeout_s: None,
            queue: LoadQueueConfig::default(),
        }
    }
}

/// Input of one prioritization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizeJob {
    pub viewport: Aabb2,
    pub tiles: Vec<(TileKey, Aabb2)>,
}

/// Classifies every tile of the job against the viewport.
///
/// Ordering contract:
/// - Output is sorted by `(priority, distance to viewport center, key)`.
pub fn prioritize(job: PrioritizeJob) -> Vec<(TileKey, LoadPriority)> {
    let center = job.viewport.center();
    let mut ranked: Vec<(LoadPriority, f64, TileKey)> = job
        .tiles
        .iter()
        .map(|(key, bounds)| {
            (
                LoadPriority::classify(bounds, &job.viewport),
                bounds.center().distance(center),
                *key,
            )
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    ranked.into_iter().map(|(p, _, k)| (k, p)).collect()
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub level: u32,
    pub visible_tiles: usize,
    pub cached_tiles: usize,
    pub capacity: usize,
    pub failed_tiles: usize,
    pub queue: LoadQueueStats,
}

/// Tile streaming orchestration: residency mirror, predictive queue and
/// (optionally offloaded) prioritization.
#[derive(Debug)]
pub struct Pipeline {
    pyramid: TilePyramid,
    config: PipelineConfig,
    cache: TileCache,
    queue: LoadQueue,
    visible: BTreeSet<TileKey>,
    failed: BTreeSet<TileKey>,
    level: u32,
    offload: Offload<PrioritizeJob, Vec<(TileKey, LoadPriority)>>,
    latest_job: Option<RequestId>,
}

impl Pipeline {
    pub fn new(pyramid: TilePyramid, config: PipelineConfig) -> Self {
        let offload = match config.offload_timeout_s {
            Some(timeout_s) => Offload::new(prioritize, timeout_s),
            None => Offload::synchronous(prioritize),
        };
        Self {
            pyramid,
            cache: TileCache::new(config.initial_capacity),
            queue: LoadQueue::new(config.queue),
            visible: BTreeSet::new(),
            failed: BTreeSet::new(),
            level: 0,
            offload,
            latest_job: None,
            config,
        }
    }

    pub fn pyramid(&self) -> &TilePyramid {
        &self.pyramid
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn queue(&self) -> &LoadQueue {
        &self.queue
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn visible_tiles(&self) -> &BTreeSet<TileKey> {
        &self.visible
    }

    pub fn offload_stats(&self) -> OffloadStats {
        self.offload.stats()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    pub fn set_concurrency_ceiling(&mut self, ceiling: usize) {
        self.queue.set_ceiling(ceiling);
    }

    pub fn residency(&self, key: TileKey) -> Option<ResidencyState> {
        if self.cache.contains(key) {
            Some(ResidencyState::Resident)
        } else if self.queue.is_loading(key) {
            Some(ResidencyState::Loading)
        } else if self.queue.is_pending(key) {
            Some(ResidencyState::Queued)
        } else if self.failed.contains(&key) {
            Some(ResidencyState::Failed)
        } else {
            None
        }
    }

    /// Recomputes the visible tile set for a camera and submits the
    /// surrounding non-resident tiles for prioritization.
    ///
    /// Returns the number of tiles enqueued or reprioritized so far; with an
    /// offload worker the rest arrive through [`Pipeline::poll`].
    pub fn plan(&mut self, viewport: &Aabb2, screen_px_per_unit: f64, now: Time) -> usize {
        self.level = self.pyramid.level_for_scale(screen_px_per_unit);
        self.visible = self.pyramid.tiles_in(viewport, self.level).into_iter().collect();

        for key in self
            .pyramid
            .tiles_in(&viewport.scaled(crate::queue::NEAR_VIEWPORT_SCALE), self.level)
        {
            self.cache.record_access(key, now);
        }

        let tiles: Vec<(TileKey, Aabb2)> = self
            .pyramid
            .tiles_in(&viewport.scaled(self.config.lookahead_scale), self.level)
            .into_iter()
            .filter(|k| !self.cache.contains(*k) && !self.queue.is_loading(*k))
            .map(|k| (k, self.pyramid.tile_bounds(k)))
            .collect();
        if tiles.is_empty() {
            return 0;
        }

        let id = self.offload.submit(
            now,
            PrioritizeJob {
                viewport: *viewport,
                tiles,
            },
        );
        self.latest_job = Some(id);
        self.poll(now)
    }

    /// Applies finished prioritization replies. Only the newest job counts.
    pub fn poll(&mut self, now: Time) -> usize {
        let mut applied = 0;
        for reply in self.offload.poll(now) {
            if Some(reply.id) != self.latest_job {
                continue;
            }
            for (key, priority) in reply.response {
                match self.queue.enqueue(key, priority, now) {
                    Ok(Enqueued::Added) => {
                        self.failed.remove(&key);
                        applied += 1;
                    }
                    Ok(Enqueued::Reprioritized) => applied += 1,
                    Ok(Enqueued::Unchanged) => {}
                    Err(full) => {
                        warn!("tile queue saturated: {full}");
                        break;
                    }
                }
            }
        }
        applied
    }

    /// Tiles to hand to the renderer now, with their image-space bounds.
    ///
    /// Loads the renderer never answered are released first and reported as
    /// failed; a later [`Pipeline::plan`] may request them again.
    pub fn next_loads(&mut self, now: Time) -> Vec<(TileKey, Aabb2)> {
        for key in self.queue.time_out(now) {
            self.failed.insert(key);
        }
        self.queue
            .drain(now)
            .into_iter()
            .map(|k| (k, self.pyramid.tile_bounds(k)))
            .collect()
    }

    /// Returns the load duration in milliseconds when the load was ours.
    pub fn tile_loaded(&mut self, key: TileKey, now: Time) -> Option<f64> {
        let ms = self.queue.complete(key, now);
        self.failed.remove(&key);
        self.cache.insert(key, self.pyramid.tile_bounds(key), now);
        ms
    }

    pub fn tile_drawn(&mut self, key: TileKey, now: Time) {
        if self.cache.touch(key, now).is_err() {
            debug!("renderer drew untracked tile {key}; adopting it");
            self.cache.insert(key, self.pyramid.tile_bounds(key), now);
        }
    }

    pub fn tile_failed(&mut self, key: TileKey) -> bool {
        self.failed.insert(key);
        self.queue.fail(key)
    }

    pub fn sweep(&mut self, now: Time, params: &SweepParams) -> SweepReport {
        self.cache.sweep(now, params, &self.visible)
    }

    pub fn deep_clean(&mut self, now: Time, record_ttl_s: f64) -> DeepCleanReport {
        self.failed.clear();
        self.cache.deep_clean(now, &self.visible, record_ttl_s)
    }

    /// Forgets every resident and queued tile.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.queue.clear();
        self.failed.clear();
    }

    pub fn shutdown(&mut self) {
        self.offload.shutdown();
        self.latest_job = None;
        self.queue.clear();
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            level: self.level,
            visible_tiles: self.visible.len(),
            cached_tiles: self.cache.len(),
            capacity: self.cache.capacity(),
            failed_tiles: self.failed.len(),
            queue: self.queue.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Pipeline, PipelineConfig, PrioritizeJob, prioritize};
    use crate::cache::SweepParams;
    use crate::queue::{LoadPriority, LoadQueueConfig};
    use crate::residency::ResidencyState;
    use crate::tile::{TileKey, TilePyramid};
    use foundation::bounds::Aabb2;
    use foundation::time::Time;

    fn pipeline() -> Pipeline {
        Pipeline::new(TilePyramid::new(4096.0, 4096.0, 256), PipelineConfig::default())
    }

    #[test]
    fn prioritize_orders_viewport_tiles_first() {
        let view = Aabb2::new([0.0, 0.0], [100.0, 100.0]);
        let out = prioritize(PrioritizeJob {
            viewport: view,
            tiles: vec![
                (TileKey::new(1, 9, 0), Aabb2::new([900.0, 0.0], [1000.0, 100.0])),
                (TileKey::new(1, 1, 0), Aabb2::new([110.0, 0.0], [120.0, 100.0])),
                (TileKey::new(1, 0, 0), Aabb2::new([0.0, 0.0], [100.0, 100.0])),
            ],
        });
        let priorities: Vec<LoadPriority> = out.iter().map(|(_, p)| *p).collect();
        assert_eq!(
            priorities,
            vec![LoadPriority::Viewport, LoadPriority::Near, LoadPriority::Far]
        );
    }

    #[test]
    fn plan_queues_visible_tiles_first() {
        let mut p = pipeline();
        let view = Aabb2::new([1024.0, 1024.0], [1536.0, 1536.0]);
        let queued = p.plan(&view, 1.0, Time(0.0));
        assert!(queued > 0);
        assert_eq!(p.level(), 12);
        assert_eq!(p.visible_tiles().len(), 9);

        let first = p.next_loads(Time(0.0));
        assert_eq!(first.len(), 4);
        for (key, bounds) in &first {
            assert!(bounds.intersects(&view), "{key} should be a viewport tile");
            assert_eq!(p.residency(*key), Some(ResidencyState::Loading));
        }
    }

    #[test]
    fn loaded_tiles_become_resident_and_visible_ones_survive_sweep() {
        let mut p = pipeline();
        let view = Aabb2::new([0.0, 0.0], [256.0, 256.0]);
        p.plan(&view, 1.0, Time(0.0));
        for (key, _) in p.next_loads(Time(0.0)) {
            p.tile_loaded(key, Time(0.1));
        }
        p.tile_drawn(TileKey::new(12, 15, 15), Time(0.2));
        assert_eq!(p.cache().len(), 5);

        let report = p.sweep(
            Time(1.0),
            &SweepParams {
                max_age_s: 0.0,
                keep_region: view,
                capacity: 0,
            },
        );
        assert!(!report.is_empty());
        assert_eq!(p.cache().len(), p.visible_tiles().iter().filter(|k| p.cache().contains(**k)).count());
        for key in p.visible_tiles() {
            if p.residency(*key) == Some(ResidencyState::Resident) {
                assert!(p.cache().contains(*key));
            }
        }
    }

    #[test]
    fn unanswered_loads_fail_and_free_their_slots() {
        let mut p = Pipeline::new(
            TilePyramid::new(4096.0, 4096.0, 256),
            PipelineConfig {
                queue: LoadQueueConfig {
                    stale_after_s: 30.0,
                    in_flight_timeout_s: 5.0,
                    ..LoadQueueConfig::default()
                },
                ..PipelineConfig::default()
            },
        );
        let view = Aabb2::new([1024.0, 1024.0], [1536.0, 1536.0]);
        p.plan(&view, 1.0, Time(0.0));
        let lost: Vec<TileKey> = p.next_loads(Time(0.0)).into_iter().map(|(k, _)| k).collect();
        assert_eq!(lost.len(), 4);
        assert!(p.next_loads(Time(3.0)).is_empty());

        let next = p.next_loads(Time(6.0));
        assert_eq!(next.len(), 4);
        assert!(next.iter().all(|(k, _)| !lost.contains(k)));
        for key in &lost {
            assert_eq!(p.residency(*key), Some(ResidencyState::Failed));
        }
        assert_eq!(p.stats().queue.timed_out, 4);

        p.plan(&view, 1.0, Time(7.0));
        for key in &lost {
            assert_eq!(p.residency(*key), Some(ResidencyState::Queued));
        }
    }

    #[test]
    fn failed_tiles_are_reported() {
        let mut p = pipeline();
        p.plan(&Aabb2::new([0.0, 0.0], [256.0, 256.0]), 1.0, Time(0.0));
        let (key, _) = p.next_loads(Time(0.0))[0];
        assert!(p.tile_failed(key));
        assert_eq!(p.residency(key), Some(ResidencyState::Failed));
        assert_eq!(p.stats().queue.failed, 1);
    }
}
