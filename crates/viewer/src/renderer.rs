use foundation::bounds::Aabb2;
use scene::ViewportState;
use serde::{Deserialize, Serialize};
use streaming::tile::{TileKey, TilePyramid};

/// Image smoothing requested from the renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderHints {
    /// Interpolated, cheap: used while the camera moves.
    Smooth,
    /// Pixel-accurate: used once the camera settles.
    Crisp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Drag,
    Scroll,
    Pinch,
}

/// Actuation surface of the tile renderer the engine drives.
///
/// The engine never draws; it only tells the renderer how much to cache,
/// how fast to load and how to filter.
pub trait TileRenderer {
    fn set_max_cached_tiles(&mut self, count: usize);
    fn set_max_concurrent_loads(&mut self, count: usize);
    fn set_blend_time(&mut self, seconds: f64);
    fn set_render_hints(&mut self, hints: RenderHints);
    fn force_redraw(&mut self);
    fn evict_tiles(&mut self, tiles: &[TileKey]);
    fn clear_cache(&mut self);
    /// Hint that now is a good moment to collect garbage.
    fn request_gc(&mut self);
    fn load_tile(&mut self, key: TileKey, bounds: Aabb2);
}

/// Notifications from the renderer into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    /// A tiled image was opened.
    Opened(TilePyramid),
    ViewportChanged(ViewportState),
    AnimationStart,
    AnimationFinish,
    GestureStart(GestureKind),
    GestureEnd(GestureKind),
    TileDrawn(TileKey),
    TileLoaded(TileKey),
    TileLoadFailed { key: TileKey, reason: String },
}

/// One recorded actuation.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererCall {
    SetMaxCachedTiles(usize),
    SetMaxConcurrentLoads(usize),
    SetBlendTime(f64),
    SetRenderHints(RenderHints),
    ForceRedraw,
    EvictTiles(Vec<TileKey>),
    ClearCache,
    RequestGc,
    LoadTile(TileKey),
}

/// Renderer that only records what it was asked to do, for headless hosts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingRenderer {
    pub calls: Vec<RendererCall>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<RendererCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn loads(&self) -> Vec<TileKey> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RendererCall::LoadTile(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn evicted(&self) -> Vec<TileKey> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RendererCall::EvictTiles(keys) => Some(keys.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl TileRenderer for RecordingRenderer {
    fn set_max_cached_tiles(&mut self, count: usize) {
        self.calls.push(RendererCall::SetMaxCachedTiles(count));
    }

    fn set_max_concurrent_loads(&mut self, count: usize) {
        self.calls.push(RendererCall::SetMaxConcurrentLoads(count));
    }

    fn set_blend_time(&mut self, seconds: f64) {
        self.calls.push(RendererCall::SetBlendTime(seconds));
    }

    fn set_render_hints(&mut self, hints: RenderHints) {
        self.calls.push(RendererCall::SetRenderHints(hints));
    }

    fn force_redraw(&mut self) {
        self.calls.push(RendererCall::ForceRedraw);
    }

    fn evict_tiles(&mut self, tiles: &[TileKey]) {
        self.calls.push(RendererCall::EvictTiles(tiles.to_vec()));
    }

    fn clear_cache(&mut self) {
        self.calls.push(RendererCall::ClearCache);
    }

    fn request_gc(&mut self) {
        self.calls.push(RendererCall::RequestGc);
    }

    fn load_tile(&mut self, key: TileKey, _bounds: Aabb2) {
        self.calls.push(RendererCall::LoadTile(key));
    }
}
