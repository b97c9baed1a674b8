use std::collections::{BTreeMap, BTreeSet};

use foundation::bounds::Aabb2;
use foundation::time::Time;
use serde::Serialize;
use tracing::debug;

use crate::tile::TileKey;

pub const DEFAULT_ACCESS_RECORD_TTL_S: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    UnknownTile(TileKey),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::UnknownTile(key) => write!(f, "tile {key} is not resident"),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Copy, Clone, PartialEq)]
struct CacheEntry {
    bounds: Aabb2,
    loaded_at: Time,
}

/// Parameters of one cleanup sweep, derived from the active pressure level.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SweepParams {
    /// Tiles not accessed for longer than this are evicted.
    pub max_age_s: f64,
    /// Tiles lying entirely outside this region are evicted.
    pub keep_region: Aabb2,
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub by_age: Vec<TileKey>,
    pub by_region: Vec<TileKey>,
    pub by_capacity: Vec<TileKey>,
}

impl SweepReport {
    pub fn evicted(&self) -> Vec<TileKey> {
        let mut all: Vec<TileKey> = self
            .by_age
            .iter()
            .chain(&self.by_region)
            .chain(&self.by_capacity)
            .copied()
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.by_age.len() + self.by_region.len() + self.by_capacity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeepCleanReport {
    pub evicted: Vec<TileKey>,
    pub purged_records: usize,
}

/// Mirror of the renderer's tile cache with per-tile access records.
///
/// The cache never evicts on insert; eviction happens only in [`TileCache::sweep`]
/// and [`TileCache::deep_clean`], which the resource manager schedules.
///
/// Notes on determinism:
/// - Entries are keyed in a `BTreeMap` for stable traversal order.
/// - Capacity eviction is oldest access first, ties by key order.
#[derive(Debug, Clone)]
pub struct TileCache {
    capacity: usize,
    entries: BTreeMap<TileKey, CacheEntry>,
    access: BTreeMap<TileKey, Time>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            access: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn access_records_len(&self) -> usize {
        self.access.len()
    }

    pub fn last_access(&self, key: TileKey) -> Option<Time> {
        self.access.get(&key).copied()
    }

    /// Registers a tile the renderer finished loading.
    pub fn insert(&mut self, key: TileKey, bounds: Aabb2, now: Time) {
        self.entries.insert(
            key,
            CacheEntry {
                bounds,
                loaded_at: now,
            },
        );
        self.access.insert(key, now);
    }

    /// Refreshes the access time of a resident tile (it was drawn).
    pub fn touch(&mut self, key: TileKey, now: Time) -> Result<(), CacheError> {
        if !self.entries.contains_key(&key) {
            return Err(CacheError::UnknownTile(key));
        }
        self.access.insert(key, now);
        Ok(())
    }

    /// Records that a tile became viewport-adjacent, resident or not.
    pub fn record_access(&mut self, key: TileKey, now: Time) {
        self.access.insert(key, now);
    }

    pub fn evict(&mut self, key: TileKey) -> Result<(), CacheError> {
        self.entries
            .remove(&key)
            .ok_or(CacheError::UnknownTile(key))?;
        self.access.remove(&key);
        Ok(())
    }

    /// Seconds since the tile was last accessed (or loaded).
    pub fn age(&self, key: TileKey, now: Time) -> Option<f64> {
        let entry = self.entries.get(&key)?;
        let last = self.access.get(&key).copied().unwrap_or(entry.loaded_at);
        Some(now.since(last))
    }

    /// Evicts stale, far-away and then least recently used tiles.
    ///
    /// Tiles in `visible` are never evicted, so afterwards
    /// `len() <= max(params.capacity, visible.len())`.
    pub fn sweep(
        &mut self,
        now: Time,
        params: &SweepParams,
        visible: &BTreeSet<TileKey>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        let candidates: Vec<TileKey> = self
            .entries
            .keys()
            .filter(|k| !visible.contains(k))
            .copied()
            .collect();
        for key in candidates {
            let Some(entry) = self.entries.get(&key).copied() else {
                continue;
            };
            if self.age(key, now).is_some_and(|age| age > params.max_age_s) {
                report.by_age.push(key);
            } else if !entry.bounds.intersects(&params.keep_region) {
                report.by_region.push(key);
            }
        }
        for key in report.by_age.iter().chain(&report.by_region) {
            self.entries.remove(key);
            self.access.remove(key);
        }

        if self.entries.len() > params.capacity {
            let mut lru: Vec<(Time, TileKey)> = self
                .entries
                .iter()
                .filter(|(k, _)| !visible.contains(k))
                .map(|(k, e)| (self.access.get(k).copied().unwrap_or(e.loaded_at), *k))
                .collect();
            lru.sort_by(|a, b| a.0.0.total_cmp(&b.0.0).then_with(|| a.1.cmp(&b.1)));
            let excess = self.entries.len() - params.capacity;
            for (_, key) in lru.into_iter().take(excess) {
                self.entries.remove(&key);
                self.access.remove(&key);
                report.by_capacity.push(key);
            }
        }

        if !report.is_empty() {
            debug!(
                "tile sweep evicted {} (age {}, region {}, capacity {}), {} resident",
                report.len(),
                report.by_age.len(),
                report.by_region.len(),
                report.by_capacity.len(),
                self.entries.len()
            );
        }
        report
    }

    /// Flushes every non-visible tile and purges old access records.
    pub fn deep_clean(
        &mut self,
        now: Time,
        visible: &BTreeSet<TileKey>,
        record_ttl_s: f64,
    ) -> DeepCleanReport {
        let evicted: Vec<TileKey> = self
            .entries
            .keys()
            .filter(|k| !visible.contains(k))
            .copied()
            .collect();
        for key in &evicted {
            self.entries.remove(key);
            self.access.remove(key);
        }
        let purged_records = self.purge_access_records(now, record_ttl_s);
        debug!(
            "deep clean evicted {} tiles, purged {purged_records} access records",
            evicted.len()
        );
        DeepCleanReport {
            evicted,
            purged_records,
        }
    }

    /// Drops access records of non-resident tiles idle longer than `ttl_s`.
    pub fn purge_access_records(&mut self, now: Time, ttl_s: f64) -> usize {
        let before = self.access.len();
        let entries = &self.entries;
        self.access
            .retain(|k, at| entries.contains_key(k) || now.since(*at) <= ttl_s);
        before - self.access.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access.clear();
    }
}
