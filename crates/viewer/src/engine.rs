//! The viewport engine: owns every component and is driven by host frame
//! callbacks and renderer events.
//!
//! Ordering contract (per `on_frame`):
//! 1. record the frame interval;
//! 2. visibility recompute if its debounce is due;
//! 3. due timers by `(deadline, kind)`: render-mode exit, metrics
//!    aggregation, cleanup sweep, deep cleanup;
//! 4. the crisp actuation scheduled by entering `Static`;
//! 5. focus overlay update;
//! 6. drain the tile load queue into the renderer;
//! 7. attach the next batch of a freshly loaded dataset.

use std::rc::Rc;

use adaptive::{
    Actuation, DeviceProfile, LevelChange, MemorySample, PerformanceSnapshot, PressureLevel,
    PressurePolicy, ResourceManager, ResourceStats,
};
use focus::{DeselectReason, Deselection, FocusError, FocusOverlay, FocusUpdate, OverlayFrame, Selected};
use foundation::math::Vec2;
use foundation::time::{Clock, Time};
use runtime::{Event, EventBus, FrameBudget, Metrics, MetricsSnapshot, SubscriptionId, Timers};
use scene::{
    DatasetError, HotspotHandle, HotspotIndex, HotspotRecord, HotspotSet, LoadReport,
    QueryCacheStats, ViewportState, VisibilityCuller,
};
use serde::Serialize;
use streaming::pipeline::{Pipeline, PipelineStats};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::events::EngineEvent;
use crate::render_mode::{ModeChange, RenderMode, RenderModeMachine};
use crate::renderer::{RenderHints, RendererEvent, TileRenderer};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    RenderModeExit,
    MetricsAggregate,
    CleanupSweep,
    DeepCleanup,
}

#[derive(Debug)]
pub enum EngineError {
    /// No viewport has been reported yet.
    NoViewport,
    UnknownId(String),
    Focus(FocusError),
    Dataset(DatasetError),
    ShutDown,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoViewport => write!(f, "no viewport reported yet"),
            EngineError::UnknownId(id) => write!(f, "no hotspot with id {id:?}"),
            EngineError::Focus(e) => write!(f, "{e}"),
            EngineError::Dataset(e) => write!(f, "{e}"),
            EngineError::ShutDown => write!(f, "engine is shut down"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Focus(e) => Some(e),
            EngineError::Dataset(e) => Some(e),
            _ => None,
        }
    }
}

/// Read-only snapshot for the host's debug/metrics surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub frame_index: u64,
    pub instant_fps: Option<f64>,
    pub render_mode: RenderMode,
    pub pressure: PressureLevel,
    pub forced_pressure: Option<PressureLevel>,
    pub policy: PressurePolicy,
    pub performance: Option<PerformanceSnapshot>,
    pub resources: ResourceStats,
    pub tiles: Option<PipelineStats>,
    pub dataset_version: String,
    pub hotspots: usize,
    pub attached_hotspots: usize,
    pub visible_hotspots: usize,
    pub query_cache: QueryCacheStats,
    pub selected: Option<String>,
    pub focus_score: Option<f64>,
    pub counters: MetricsSnapshot,
}

#[derive(Debug)]
pub struct ViewportEngine<R: TileRenderer> {
    config: EngineConfig,
    profile: DeviceProfile,
    renderer: R,
    index: HotspotIndex,
    culler: VisibilityCuller,
    mode: RenderModeMachine,
    resources: ResourceManager,
    pipeline: Option<Pipeline>,
    focus: FocusOverlay,
    overlay: Option<OverlayFrame>,
    timers: Timers<TimerKind>,
    events: EventBus<EngineEvent>,
    metrics: Metrics,
    viewport: Option<ViewportState>,
    hovered: Option<HotspotHandle>,
    memory: Option<MemorySample>,
    frame_index: u64,
    shut_down: bool,
}

impl<R: TileRenderer> ViewportEngine<R> {
    pub fn new(renderer: R, config: EngineConfig, profile: DeviceProfile, clock: Rc<dyn Clock>) -> Self {
        let events = if config.record_events {
            EventBus::new()
        } else {
            EventBus::without_log()
        };
        Self {
            index: HotspotIndex::new(clock, config.spatial.query_options()),
            culler: VisibilityCuller::new(config.culling.visibility_options()),
            mode: RenderModeMachine::new(config.render_mode),
            resources: ResourceManager::new(config.resources, profile),
            focus: FocusOverlay::new(config.focus),
            pipeline: None,
            overlay: None,
            timers: Timers::new(),
            events,
            metrics: Metrics::new(),
            viewport: None,
            hovered: None,
            memory: None,
            frame_index: 0,
            shut_down: false,
            renderer,
            profile,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn index(&self) -> &HotspotIndex {
        &self.index
    }

    pub fn viewport(&self) -> Option<&ViewportState> {
        self.viewport.as_ref()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode.mode()
    }

    pub fn pressure_level(&self) -> PressureLevel {
        self.resources.level()
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn overlay(&self) -> Option<&OverlayFrame> {
        self.overlay.as_ref()
    }

    pub fn selected(&self) -> Option<HotspotHandle> {
        self.focus.selected()
    }

    pub fn hovered(&self) -> Option<HotspotHandle> {
        self.hovered
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&Event<EngineEvent>) + 'static) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn drain_events(&mut self) -> Vec<Event<EngineEvent>> {
        self.events.drain()
    }

    /// Latest heap reading from the host; `None` when it cannot measure.
    pub fn report_memory(&mut self, sample: Option<MemorySample>) {
        self.memory = sample;
    }

    // --- dataset ---

    pub fn load_hotspots(&mut self, records: Vec<HotspotRecord>) -> LoadReport {
        let (set, report) = HotspotSet::load(records, self.next_generation());
        self.install(set, &report);
        report
    }

    pub fn load_hotspots_json(&mut self, json: &str) -> Result<LoadReport, EngineError> {
        let (set, report) =
            HotspotSet::from_json(json, self.next_generation()).map_err(EngineError::Dataset)?;
        self.install(set, &report);
        Ok(report)
    }

    fn next_generation(&self) -> u32 {
        self.index.set().generation().wrapping_add(1)
    }

    fn install(&mut self, set: HotspotSet, report: &LoadReport) {
        let exited = self.ids_of(&self.culler.visible_handles());
        self.index.install(set);
        self.culler.begin_attach(&self.index);

        if let Some(d) = self.focus.deselect(DeselectReason::HotspotRemoved) {
            self.overlay = None;
            self.emit(EngineEvent::Deselected {
                hotspot: d.handle,
                reason: d.reason,
            });
        }
        if self.hovered.take().is_some() {
            self.emit(EngineEvent::HoverChanged {
                hotspot: None,
                id: None,
            });
        }
        if !exited.is_empty() {
            self.emit(EngineEvent::VisibleHotspotsChanged {
                entered: Vec::new(),
                exited,
                prioritized: Vec::new(),
            });
        }

        let version = self.index.set().version().to_string();
        info!(
            "hotspot dataset {} loaded: {} accepted, {} rejected",
            version,
            report.accepted,
            report.rejected.len()
        );
        self.metrics.set_gauge("hotspots.loaded", report.accepted as f64);
        if !report.rejected.is_empty() {
            self.metrics
                .inc_counter("hotspots.rejected", report.rejected.len() as u64);
            self.warn(format!(
                "{} hotspot records rejected (first: {})",
                report.rejected.len(),
                report.rejected[0].id
            ));
        }
        self.emit(EngineEvent::DatasetLoaded {
            version,
            accepted: report.accepted,
            rejected: report.rejected.len(),
        });
    }

    // --- renderer events ---

    pub fn handle_event(&mut self, event: RendererEvent, now: Time) {
        if self.shut_down {
            return;
        }
        match event {
            RendererEvent::Opened(pyramid) => self.opened(Pipeline::new(pyramid, self.config.pipeline), now),
            RendererEvent::ViewportChanged(viewport) => self.viewport_changed(viewport, now),
            RendererEvent::AnimationStart => {
                if let Some(change) = self.mode.animation_start(now) {
                    self.mode_changed(change);
                }
                self.arm_mode_exit(now);
            }
            RendererEvent::AnimationFinish => {
                self.mode.animation_finish(now);
                self.arm_mode_exit(now);
            }
            RendererEvent::GestureStart(kind) => {
                if let Some(change) = self.mode.gesture_start(kind, now) {
                    self.mode_changed(change);
                }
                self.arm_mode_exit(now);
            }
            RendererEvent::GestureEnd(kind) => {
                self.mode.gesture_end(kind, now);
                self.arm_mode_exit(now);
            }
            RendererEvent::TileDrawn(key) => {
                if let Some(p) = self.pipeline.as_mut() {
                    p.tile_drawn(key, now);
                }
            }
            RendererEvent::TileLoaded(key) => {
                if let Some(p) = self.pipeline.as_mut() {
                    if let Some(ms) = p.tile_loaded(key, now) {
                        self.metrics.record_histogram("tiles.load_ms", ms);
                    }
                    self.metrics.inc_counter("tiles.loaded", 1);
                }
            }
            RendererEvent::TileLoadFailed { key, reason } => {
                if let Some(p) = self.pipeline.as_mut() {
                    p.tile_failed(key);
                }
                self.metrics.inc_counter("tiles.load_failed", 1);
                self.warn(format!("tile {key} failed to load: {reason}"));
            }
        }
    }

    fn opened(&mut self, pipeline: Pipeline, now: Time) {
        if let Some(mut old) = self.pipeline.replace(pipeline) {
            old.shutdown();
            self.renderer.clear_cache();
        }
        let actuations = self.resources.initial_actuations();
        self.apply_actuations(&actuations, now);
        self.timers.every(
            TimerKind::MetricsAggregate,
            now,
            self.config.resources.metrics_interval_s,
        );
        self.timers.every(
            TimerKind::CleanupSweep,
            now,
            self.resources.policy().cleanup_interval_s,
        );
        self.timers.every(
            TimerKind::DeepCleanup,
            now,
            self.config.resources.deep_cleanup_interval_s,
        );
        self.renderer.set_render_hints(self.mode.mode().hints());
        if let Some(vp) = self.viewport
            && let Some(p) = self.pipeline.as_mut()
        {
            p.plan(&vp.bounds, vp.scale().x, now);
        }
        debug!("tile source opened at level {}", self.resources.level());
    }

    fn viewport_changed(&mut self, viewport: ViewportState, now: Time) {
        self.viewport = Some(viewport);
        self.culler.viewport_changed(now);
        if let Some(change) = self.mode.viewport_changed(&viewport, now) {
            self.mode_changed(change);
        }
        self.arm_mode_exit(now);
        if let Some(p) = self.pipeline.as_mut() {
            p.plan(&viewport.bounds, viewport.scale().x, now);
        }
    }

    fn arm_mode_exit(&mut self, now: Time) {
        if let Some(deadline) = self.mode.settle_deadline() {
            self.timers
                .debounce(TimerKind::RenderModeExit, now, deadline.since(now).max(0.0));
        }
    }

    fn mode_changed(&mut self, change: ModeChange) {
        if change.to == RenderMode::Animating {
            self.renderer.set_render_hints(RenderHints::Smooth);
        }
        debug!("render mode {:?} -> {:?}", change.from, change.to);
        self.emit(EngineEvent::RenderModeChanged {
            from: change.from,
            to: change.to,
        });
    }

    // --- frame loop ---

    /// Advances the engine by one host frame.
    pub fn on_frame(&mut self, now: Time) {
        if self.shut_down {
            return;
        }
        self.frame_index += 1;
        self.resources.record_frame(now);

        if self.culler.take_due(now) {
            self.recompute_visibility();
        }

        for kind in self.timers.poll(now) {
            match kind {
                TimerKind::RenderModeExit => {
                    if let Some(change) = self.mode.settle(now) {
                        self.mode_changed(change);
                    }
                }
                TimerKind::MetricsAggregate => self.aggregate(now),
                TimerKind::CleanupSweep => {
                    self.run_sweep(now);
                }
                TimerKind::DeepCleanup => self.run_deep_clean(now),
            }
        }

        if self.mode.take_crisp() {
            self.renderer.set_render_hints(RenderHints::Crisp);
            self.renderer.force_redraw();
        }

        self.update_focus(now);

        if let Some(p) = self.pipeline.as_mut() {
            p.poll(now);
            for (key, bounds) in p.next_loads(now) {
                self.renderer.load_tile(key, bounds);
            }
        }

        if !self.culler.is_fully_attached() {
            let mut budget = FrameBudget::new(self.config.culling.attach_batch_size);
            let before = self.culler.attached_len();
            self.culler.attach_step(&mut budget);
            if self.culler.attached_len() > before {
                self.recompute_visibility();
            }
        }
    }

    fn recompute_visibility(&mut self) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let delta = self.culler.recompute(&mut self.index, &viewport);
        self.metrics
            .set_gauge("hotspots.visible", self.culler.visible_len() as f64);
        if delta.is_empty() {
            return;
        }
        let entered = self.ids_of(&delta.entered);
        let exited = self.ids_of(&delta.exited);
        let prioritized = self.preload_candidates();
        self.emit(EngineEvent::VisibleHotspotsChanged {
            entered,
            exited,
            prioritized,
        });
    }

    fn update_focus(&mut self, now: Time) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let animating = self.mode.mode() == RenderMode::Animating;
        match self.focus.update(self.index.set(), &viewport, animating, now) {
            FocusUpdate::Inactive => self.overlay = None,
            FocusUpdate::Throttled => {}
            FocusUpdate::Frame(frame) => self.overlay = Some(frame),
            FocusUpdate::Deselected(d) => {
                self.overlay = None;
                self.emit(EngineEvent::Deselected {
                    hotspot: d.handle,
                    reason: d.reason,
                });
            }
        }
    }

    // --- resources ---

    fn aggregate(&mut self, now: Time) {
        let ctx = EngineContext {
            now,
            memory: self.memory,
            tiles: self.pipeline.as_ref().map(Pipeline::stats).unwrap_or_default(),
            profile: &self.profile,
        };
        let (snap, change) = self.resources.aggregate(&ctx);
        self.metrics.set_gauge("fps.avg", snap.avg_fps);
        self.metrics.set_gauge("performance.score", snap.score);
        if let Some(change) = change {
            self.apply_level_change(change, now);
        }
    }

    fn apply_level_change(&mut self, change: LevelChange, now: Time) {
        self.metrics.inc_counter("pressure.changes", 1);
        self.emit(EngineEvent::PressureChanged {
            from: change.from,
            to: change.to,
            forced: change.forced,
        });
        self.apply_actuations(&change.actuations, now);
    }

    fn apply_actuations(&mut self, actuations: &[Actuation], now: Time) {
        for a in actuations {
            match *a {
                Actuation::SetCacheCapacity(n) => {
                    self.renderer.set_max_cached_tiles(n);
                    if let Some(p) = self.pipeline.as_mut() {
                        p.set_capacity(n);
                    }
                }
                Actuation::SetMaxConcurrentLoads(n) => {
                    self.renderer.set_max_concurrent_loads(n);
                    if let Some(p) = self.pipeline.as_mut() {
                        p.set_concurrency_ceiling(n);
                    }
                }
                Actuation::SetBlendTime(s) => self.renderer.set_blend_time(s),
                Actuation::RescheduleCleanup(s) => {
                    if self.pipeline.is_some() {
                        self.timers.every(TimerKind::CleanupSweep, now, s);
                    }
                }
                Actuation::CleanupNow => {
                    self.run_sweep(now);
                }
            }
        }
    }

    fn run_sweep(&mut self, now: Time) -> usize {
        let (Some(p), Some(viewport)) = (self.pipeline.as_mut(), self.viewport) else {
            return 0;
        };
        let report = self.resources.run_sweep(p, &viewport.bounds, now);
        if report.is_empty() {
            return 0;
        }
        let evicted = report.evicted();
        debug!(
            "cleanup sweep evicted {} tiles ({} by age, {} by region, {} by capacity)",
            evicted.len(),
            report.by_age.len(),
            report.by_region.len(),
            report.by_capacity.len()
        );
        self.renderer.evict_tiles(&evicted);
        self.metrics.inc_counter("tiles.evicted", evicted.len() as u64);
        evicted.len()
    }

    fn run_deep_clean(&mut self, now: Time) {
        let Some(p) = self.pipeline.as_mut() else {
            return;
        };
        let report = self.resources.run_deep_clean(p, now);
        if !report.evicted.is_empty() {
            self.renderer.evict_tiles(&report.evicted);
            self.metrics
                .inc_counter("tiles.evicted", report.evicted.len() as u64);
        }
        debug!(
            "deep cleanup: {} tiles flushed, {} access records purged",
            report.evicted.len(),
            report.purged_records
        );
        self.renderer.request_gc();
    }

    /// Pins a pressure level, or returns to automatic with `None`.
    pub fn force_level(&mut self, level: Option<PressureLevel>, now: Time) -> Option<LevelChange> {
        let change = self.resources.force_level(level)?;
        self.apply_level_change(change.clone(), now);
        Some(change)
    }

    /// Runs a cleanup sweep now; returns the number of tiles evicted.
    pub fn force_cleanup(&mut self, now: Time) -> usize {
        self.run_sweep(now)
    }

    // --- pointer and selection ---

    /// Updates the hovered hotspot for a pointer at `screen` pixels.
    pub fn pointer_moved(&mut self, screen: Vec2) -> Option<HotspotHandle> {
        let viewport = self.viewport?;
        let p = viewport.screen_to_image(screen);
        let hit = self.index.hit_test(p.x, p.y);
        self.set_hovered(hit);
        hit
    }

    pub fn pointer_left(&mut self) {
        self.set_hovered(None);
    }

    fn set_hovered(&mut self, hit: Option<HotspotHandle>) {
        if hit == self.hovered {
            return;
        }
        self.hovered = hit;
        let id = hit.and_then(|h| self.index.get(h)).map(|h| h.id().to_string());
        self.emit(EngineEvent::HoverChanged { hotspot: hit, id });
    }

    /// Selects the hotspot under `screen`, or clears the selection when the
    /// click lands on empty image.
    pub fn click(&mut self, screen: Vec2, now: Time) -> Result<Option<HotspotHandle>, EngineError> {
        let viewport = self.viewport.ok_or(EngineError::NoViewport)?;
        let p = viewport.screen_to_image(screen);
        match self.index.hit_test(p.x, p.y) {
            Some(handle) => {
                self.select(handle, now)?;
                Ok(Some(handle))
            }
            None => {
                self.deselect();
                Ok(None)
            }
        }
    }

    pub fn select(&mut self, handle: HotspotHandle, now: Time) -> Result<Selected, EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }
        let viewport = self.viewport.ok_or(EngineError::NoViewport)?;
        let already = self.focus.selected() == Some(handle);
        let selected = self
            .focus
            .select(self.index.set(), handle, &viewport, now)
            .map_err(EngineError::Focus)?;
        if !already {
            let id = self
                .index
                .get(handle)
                .map(|h| h.id().to_string())
                .unwrap_or_default();
            self.emit(EngineEvent::Selected {
                hotspot: handle,
                id,
                replaced: selected.replaced,
                switch: selected.switch,
            });
        }
        Ok(selected)
    }

    pub fn select_id(&mut self, id: &str, now: Time) -> Result<Selected, EngineError> {
        let handle = self
            .index
            .set()
            .handle_of(id)
            .ok_or_else(|| EngineError::UnknownId(id.to_string()))?;
        self.select(handle, now)
    }

    pub fn deselect(&mut self) -> Option<Deselection> {
        let d = self.focus.deselect(DeselectReason::Manual)?;
        self.overlay = None;
        self.emit(EngineEvent::Deselected {
            hotspot: d.handle,
            reason: d.reason,
        });
        Some(d)
    }

    // --- outputs ---

    /// Visible hotspot ids, nearest to the viewport center first.
    pub fn preload_candidates(&self) -> Vec<String> {
        self.ids_of(self.culler.prioritized())
    }

    pub fn metrics(&self) -> EngineMetrics {
        let selected = self
            .focus
            .selected()
            .and_then(|h| self.index.get(h))
            .map(|h| h.id().to_string());
        EngineMetrics {
            frame_index: self.frame_index,
            instant_fps: self.resources.instant_fps(),
            render_mode: self.mode.mode(),
            pressure: self.resources.level(),
            forced_pressure: self.resources.forced_level(),
            policy: *self.resources.policy(),
            performance: self.resources.last_snapshot(),
            resources: self.resources.stats(),
            tiles: self.pipeline.as_ref().map(Pipeline::stats),
            dataset_version: self.index.set().version().to_string(),
            hotspots: self.index.set().len(),
            attached_hotspots: self.culler.attached_len(),
            visible_hotspots: self.culler.visible_len(),
            query_cache: self.index.cache_stats(),
            selected,
            focus_score: self.focus.score(),
            counters: self.metrics.snapshot(),
        }
    }

    /// Cancels every timer, detaches every subscriber and stops the worker.
    /// Later calls are ignored.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.timers.clear();
        self.events.clear();
        if let Some(p) = self.pipeline.as_mut() {
            p.shutdown();
        }
        self.culler.reset();
        self.focus.reset();
        self.mode.reset();
        self.overlay = None;
        self.hovered = None;
        self.shut_down = true;
        info!("viewport engine shut down after {} frames", self.frame_index);
    }

    fn ids_of(&self, handles: &[HotspotHandle]) -> Vec<String> {
        handles
            .iter()
            .filter_map(|h| self.index.get(*h))
            .map(|h| h.id().to_string())
            .collect()
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.emit(self.frame_index, event);
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.metrics.warn(message.clone());
        self.emit(EngineEvent::Warning { message });
    }
}

impl<R: TileRenderer> Drop for ViewportEngine<R> {
    fn drop(&mut self) {
        if let Some(p) = self.pipeline.as_mut() {
            p.shutdown();
        }
    }
}
