use std::collections::{BTreeMap, VecDeque};

use foundation::bounds::Aabb2;
use foundation::time::Time;
use runtime::work_queue::{WorkId, WorkQueue, WorkQueueFull};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tile::TileKey;

/// Load urgency of a tile relative to the current viewport. Lower runs first.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LoadPriority {
    /// Intersects the viewport.
    Viewport = 0,
    /// Within the viewport scaled by [`NEAR_VIEWPORT_SCALE`].
    Near = 1,
    Far = 2,
}

pub const NEAR_VIEWPORT_SCALE: f64 = 1.5;

impl LoadPriority {
    pub fn classify(tile: &Aabb2, viewport: &Aabb2) -> Self {
        if tile.intersects(viewport) {
            LoadPriority::Viewport
        } else if tile.intersects(&viewport.scaled(NEAR_VIEWPORT_SCALE)) {
            LoadPriority::Near
        } else {
            LoadPriority::Far
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadQueueConfig {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub initial_concurrency: usize,
    /// Rolling average above this lowers concurrency by one.
    pub slow_load_ms: f64,
    /// Rolling average below this raises concurrency by one.
    pub fast_load_ms: f64,
    pub load_time_window: usize,
    /// Queued entries older than this are dropped.
    pub stale_after_s: f64,
    /// In-flight loads with no completion or failure after this long free
    /// their slot.
    pub in_flight_timeout_s: f64,
    pub max_pending: usize,
}

impl Default for LoadQueueConfig {
    fn default() -> Self {
        Self {
            min_concurrency: 2,
            max_concurrency: 8,
            initial_concurrency: 4,
            slow_load_ms: 500.0,
            fast_load_ms: 200.0,
            load_time_window: 20,
            stale_after_s: 10.0,
            in_flight_timeout_s: 10.0,
            max_pending: 512,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    Reprioritized,
    /// Already queued at the same priority, or currently loading.
    Unchanged,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct LoadQueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub concurrency: usize,
    pub ceiling: usize,
    pub avg_load_ms: Option<f64>,
    pub completed: u64,
    pub failed: u64,
    pub expired: u64,
    pub timed_out: u64,
}

/// Predictive tile-load queue with adaptive concurrency.
///
/// Ordering contract:
/// - `drain` starts loads by `(priority, enqueue order)`.
/// - A key is either pending or in flight, never both, and never twice.
/// - No load holds a slot longer than `in_flight_timeout_s`.
#[derive(Debug)]
pub struct LoadQueue {
    config: LoadQueueConfig,
    queue: WorkQueue<TileKey>,
    pending: BTreeMap<TileKey, WorkId>,
    in_flight: BTreeMap<TileKey, Time>,
    concurrency: usize,
    ceiling: usize,
    load_times_ms: VecDeque<f64>,
    completed: u64,
    failed: u64,
    expired: u64,
    timed_out: u64,
}

impl LoadQueue {
    pub fn new(config: LoadQueueConfig) -> Self {
        let concurrency = config
            .initial_concurrency
            .clamp(config.min_concurrency, config.max_concurrency);
        Self {
            queue: WorkQueue::with_max_len(config.max_pending),
            pending: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            concurrency,
            ceiling: config.max_concurrency,
            load_times_ms: VecDeque::with_capacity(config.load_time_window),
            completed: 0,
            failed: 0,
            expired: 0,
            timed_out: 0,
            config,
        }
    }

    pub fn config(&self) -> &LoadQueueConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_pending(&self, key: TileKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn is_loading(&self, key: TileKey) -> bool {
        self.in_flight.contains_key(&key)
    }

    pub fn priority_of(&self, key: TileKey) -> Option<LoadPriority> {
        let id = *self.pending.get(&key)?;
        self.queue
            .iter()
            .find(|(wid, _, _)| *wid == id)
            .and_then(|(_, p, _)| priority_from_i32(p))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upper bound imposed by memory pressure.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Loads allowed in flight right now.
    pub fn limit(&self) -> usize {
        self.concurrency.min(self.ceiling)
    }

    pub fn set_ceiling(&mut self, ceiling: usize) {
        self.ceiling = ceiling.clamp(1, self.config.max_concurrency);
        self.concurrency = self.concurrency.min(self.ceiling.max(self.config.min_concurrency));
    }

    pub fn average_load_ms(&self) -> Option<f64> {
        if self.load_times_ms.is_empty() {
            return None;
        }
        Some(self.load_times_ms.iter().sum::<f64>() / self.load_times_ms.len() as f64)
    }

    /// Queues a tile, or updates its priority if it is already queued.
    pub fn enqueue(
        &mut self,
        key: TileKey,
        priority: LoadPriority,
        now: Time,
    ) -> Result<Enqueued, WorkQueueFull> {
        if self.in_flight.contains_key(&key) {
            return Ok(Enqueued::Unchanged);
        }
        if let Some(&id) = self.pending.get(&key) {
            if self.priority_of(key) == Some(priority) {
                return Ok(Enqueued::Unchanged);
            }
            self.queue.set_priority(id, priority as i32);
            return Ok(Enqueued::Reprioritized);
        }
        let id = self.queue.try_push(priority as i32, now, key)?;
        self.pending.insert(key, id);
        Ok(Enqueued::Added)
    }

    pub fn cancel(&mut self, key: TileKey) -> bool {
        match self.pending.remove(&key) {
            Some(id) => self.queue.cancel(id).is_some(),
            None => false,
        }
    }

    /// Drops queued entries older than the staleness bound.
    pub fn expire(&mut self, now: Time) -> Vec<TileKey> {
        let mut stale = self.queue.expire(now, self.config.stale_after_s);
        for key in &stale {
            self.pending.remove(key);
        }
        stale.sort();
        self.expired += stale.len() as u64;
        if !stale.is_empty() {
            debug!("dropped {} stale tile requests", stale.len());
        }
        stale
    }

    /// Releases in-flight loads the renderer never answered. A released tile
    /// is neither pending nor loading, so the next plan may request it again.
    pub fn time_out(&mut self, now: Time) -> Vec<TileKey> {
        let timeout_s = self.config.in_flight_timeout_s;
        let lost: Vec<TileKey> = self
            .in_flight
            .iter()
            .filter(|(_, started)| now.since(**started) > timeout_s)
            .map(|(key, _)| *key)
            .collect();
        for key in &lost {
            self.in_flight.remove(key);
        }
        self.timed_out += lost.len() as u64;
        if !lost.is_empty() {
            debug!("released {} unanswered tile loads", lost.len());
        }
        lost
    }

    /// Expires stale entries and unanswered loads, then moves queued tiles
    /// into flight up to the current limit. Returns the tiles to start loading.
    pub fn drain(&mut self, now: Time) -> Vec<TileKey> {
        self.expire(now);
        self.time_out(now);
        let mut started = Vec::new();
        while self.in_flight.len() < self.limit() {
            let Some(item) = self.queue.pop_next() else {
                break;
            };
            self.pending.remove(&item.payload);
            self.in_flight.insert(item.payload, now);
            started.push(item.payload);
        }
        started
    }

    /// Marks a load finished; returns its duration in milliseconds.
    pub fn complete(&mut self, key: TileKey, now: Time) -> Option<f64> {
        let started = self.in_flight.remove(&key)?;
        let ms = now.since(started) * 1000.0;
        self.completed += 1;
        if self.load_times_ms.len() >= self.config.load_time_window.max(1) {
            self.load_times_ms.pop_front();
        }
        self.load_times_ms.push_back(ms);
        self.adapt();
        Some(ms)
    }

    /// Marks a load failed. Unknown keys are still counted.
    pub fn fail(&mut self, key: TileKey) -> bool {
        self.failed += 1;
        let known = self.in_flight.remove(&key).is_some();
        debug!("tile {key} failed to load");
        known
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.in_flight.clear();
    }

    pub fn stats(&self) -> LoadQueueStats {
        LoadQueueStats {
            pending: self.pending.len(),
            in_flight: self.in_flight.len(),
            concurrency: self.concurrency,
            ceiling: self.ceiling,
            avg_load_ms: self.average_load_ms(),
            completed: self.completed,
            failed: self.failed,
            expired: self.expired,
            timed_out: self.timed_out,
        }
    }

    fn adapt(&mut self) {
        let Some(avg) = self.average_load_ms() else {
            return;
        };
        let before = self.concurrency;
        if avg > self.config.slow_load_ms {
            self.concurrency = self
                .concurrency
                .saturating_sub(1)
                .max(self.config.min_concurrency);
        } else if avg < self.config.fast_load_ms {
            let cap = self.config.max_concurrency.min(self.ceiling);
            if self.concurrency < cap {
                self.concurrency += 1;
            }
        }
        if self.concurrency != before {
            debug!(
                "tile load concurrency {before} -> {} (avg {avg:.0} ms)",
                self.concurrency
            );
        }
    }
}

fn priority_from_i32(p: i32) -> Option<LoadPriority> {
    match p {
        0 => Some(LoadPriority::Viewport),
        1 => Some(LoadPriority::Near),
        2 => Some(LoadPriority::Far),
        _ => None,
    }
}
