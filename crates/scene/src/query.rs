use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::bounds::Aabb2;
use foundation::math::Vec2;
use foundation::math::precision::quantize;
use foundation::time::{Clock, Time};
use serde::Serialize;
use tracing::debug;

use crate::dataset::{HotspotSet, LoadReport};
use crate::hotspot::{Hotspot, HotspotHandle, HotspotRecord};
use crate::picking::{PickOptions, pick_point};
use crate::spatial::{Item, RTree};

pub const DEFAULT_QUERY_CACHE_TTL_S: f64 = 1.0;
pub const DEFAULT_BOUNDS_QUANTUM: f64 = 1.0;
const ZOOM_QUANTUM: f64 = 1e-3;
const MAX_CACHED_QUERIES: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QueryOptions {
    /// Seconds a cached viewport query stays valid.
    pub cache_ttl_s: f64,
    /// Image units that bounds are snapped to when forming cache keys.
    pub bounds_quantum: f64,
    pub pick: PickOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            cache_ttl_s: DEFAULT_QUERY_CACHE_TTL_S,
            bounds_quantum: DEFAULT_BOUNDS_QUANTUM,
            pick: PickOptions::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct QueryKey {
    min: [i64; 2],
    max: [i64; 2],
    zoom: i64,
}

#[derive(Debug, Clone)]
struct CachedQuery {
    at: Time,
    handles: Rc<[HotspotHandle]>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Hotspot dataset plus its R-tree and a short-lived viewport query cache.
///
/// The index is read-only between loads; `reload` swaps the whole dataset,
/// rebuilds the tree and drops the cache.
pub struct HotspotIndex {
    set: HotspotSet,
    tree: RTree,
    clock: Rc<dyn Clock>,
    options: QueryOptions,
    cache: BTreeMap<QueryKey, CachedQuery>,
    stats: QueryCacheStats,
}

impl std::fmt::Debug for HotspotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotspotIndex")
            .field("hotspots", &self.set.len())
            .field("generation", &self.set.generation())
            .field("tree_height", &self.tree.height())
            .field("cache", &self.stats)
            .finish()
    }
}

impl HotspotIndex {
    pub fn new(clock: Rc<dyn Clock>, options: QueryOptions) -> Self {
        Self {
            set: HotspotSet::empty(0),
            tree: RTree::default(),
            clock,
            options,
            cache: BTreeMap::new(),
            stats: QueryCacheStats::default(),
        }
    }

    pub fn from_set(set: HotspotSet, clock: Rc<dyn Clock>, options: QueryOptions) -> Self {
        let mut index = Self::new(clock, options);
        index.install(set);
        index
    }

    /// Loads a fresh dataset under the next generation.
    pub fn reload(&mut self, records: Vec<HotspotRecord>) -> LoadReport {
        let generation = self.set.generation().wrapping_add(1);
        let (set, report) = HotspotSet::load(records, generation);
        self.install(set);
        report
    }

    /// Replaces the dataset with an already validated one.
    pub fn install(&mut self, set: HotspotSet) {
        let items = set
            .iter()
            .map(|(handle, h)| Item {
                handle,
                bounds: h.bbox(),
            })
            .collect();
        self.tree = RTree::bulk_load(items);
        self.set = set;
        self.cache.clear();
        self.stats.entries = 0;
        debug!(
            "hotspot index rebuilt: {} items, tree height {}",
            self.tree.len(),
            self.tree.height()
        );
    }

    pub fn set(&self) -> &HotspotSet {
        &self.set
    }

    pub fn tree(&self) -> &RTree {
        &self.tree
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn get(&self, handle: HotspotHandle) -> Option<&Hotspot> {
        self.set.get(handle)
    }

    pub fn cache_stats(&self) -> QueryCacheStats {
        self.stats
    }

    /// All hotspots whose bbox intersects `bounds`, ascending by index.
    ///
    /// Results are reused for the same quantized `(bounds, zoom)` until they
    /// are older than the cache TTL.
    pub fn query_viewport(&mut self, bounds: &Aabb2, zoom: f64) -> Rc<[HotspotHandle]> {
        let now = self.clock.now();
        let key = self.key_for(bounds, zoom);
        let ttl = self.options.cache_ttl_s;

        if let Some(hit) = self.cache.get(&key)
            && now.since(hit.at) < ttl
        {
            self.stats.hits += 1;
            return hit.handles.clone();
        }

        self.stats.misses += 1;
        let handles: Rc<[HotspotHandle]> = self.tree.query_aabb(bounds).into();
        self.cache.retain(|_, c| now.since(c.at) < ttl);
        if self.cache.len() >= MAX_CACHED_QUERIES
            && let Some(oldest) = self
                .cache
                .iter()
                .min_by(|a, b| a.1.at.0.total_cmp(&b.1.at.0))
                .map(|(k, _)| *k)
        {
            self.cache.remove(&oldest);
        }
        self.cache.insert(
            key,
            CachedQuery {
                at: now,
                handles: handles.clone(),
            },
        );
        self.stats.entries = self.cache.len();
        handles
    }

    /// Topmost hotspot containing the image point, if any.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<HotspotHandle> {
        pick_point(&self.set, &self.tree, Vec2::new(x, y), self.options.pick)
    }

    fn key_for(&self, bounds: &Aabb2, zoom: f64) -> QueryKey {
        let q = self.options.bounds_quantum;
        QueryKey {
            min: [quantize(bounds.min[0], q), quantize(bounds.min[1], q)],
            max: [quantize(bounds.max[0], q), quantize(bounds.max[1], q)],
            zoom: quantize(zoom, ZOOM_QUANTUM),
        }
    }
}
