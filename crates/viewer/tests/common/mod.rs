#![allow(dead_code)]

use std::rc::Rc;

use adaptive::DeviceProfile;
use foundation::math::Vec2;
use foundation::time::{ManualClock, Time};
use scene::{HotspotKind, HotspotRecord, Shape, ViewportState};
use streaming::tile::TilePyramid;
use tracing_subscriber::EnvFilter;
use viewer::{EngineConfig, EngineEvent, RecordingRenderer, RendererCall, RendererEvent, ViewportEngine};

pub const IMAGE_SIZE: f64 = 8192.0;
pub const FRAME_S: f64 = 1.0 / 60.0;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn record(id: &str, rings: Vec<Vec<(f64, f64)>>) -> HotspotRecord {
    HotspotRecord {
        id: id.to_string(),
        kind: HotspotKind::AudioOnly,
        shape: Shape::Polygon,
        rings,
        title: None,
        audio_url: Some(format!("audio/{id}.mp3")),
        image_url: None,
        link_url: None,
    }
}

/// Axis-aligned square with its min corner at `(x, y)`.
pub fn square(id: &str, x: f64, y: f64, size: f64) -> HotspotRecord {
    record(
        id,
        vec![vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]],
    )
}

/// L-shaped hotspot; the notch around (3400, 3400) is outside it.
pub fn concave(id: &str) -> HotspotRecord {
    record(
        id,
        vec![vec![
            (3000.0, 3000.0),
            (3600.0, 3000.0),
            (3600.0, 3200.0),
            (3200.0, 3200.0),
            (3200.0, 3600.0),
            (3000.0, 3600.0),
        ]],
    )
}

pub fn dataset() -> Vec<HotspotRecord> {
    vec![
        square("a", 1000.0, 1000.0, 200.0),
        square("b", 1400.0, 1000.0, 200.0),
        concave("el"),
        square("far", 7000.0, 7000.0, 200.0),
    ]
}

pub fn view(center: (f64, f64), zoom: f64) -> ViewportState {
    ViewportState::centered(
        Vec2::new(center.0, center.1),
        zoom,
        Vec2::new(1000.0, 750.0),
        IMAGE_SIZE,
    )
}

/// Engine over a recording renderer, driven by a hand-advanced clock.
pub struct Harness {
    pub clock: ManualClock,
    pub engine: ViewportEngine<RecordingRenderer>,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_profile(config, DeviceProfile::desktop())
    }

    pub fn with_profile(config: EngineConfig, profile: DeviceProfile) -> Self {
        init_tracing();
        let clock = ManualClock::new(Time::ZERO);
        let engine = ViewportEngine::new(
            RecordingRenderer::new(),
            config,
            profile,
            Rc::new(clock.clone()),
        );
        Self { clock, engine }
    }

    /// Default engine with the tile source opened and a camera at `center`.
    pub fn opened(center: (f64, f64), zoom: f64) -> Self {
        let mut h = Self::new(EngineConfig::default());
        h.open();
        h.set_view(center, zoom);
        h
    }

    pub fn now(&self) -> Time {
        use foundation::time::Clock;
        self.clock.now()
    }

    pub fn open(&mut self) {
        let now = self.now();
        self.engine.handle_event(
            RendererEvent::Opened(TilePyramid::new(IMAGE_SIZE, IMAGE_SIZE, 256)),
            now,
        );
    }

    pub fn set_view(&mut self, center: (f64, f64), zoom: f64) {
        let now = self.now();
        self.engine
            .handle_event(RendererEvent::ViewportChanged(view(center, zoom)), now);
    }

    pub fn send(&mut self, event: RendererEvent) {
        let now = self.now();
        self.engine.handle_event(event, now);
    }

    pub fn frame(&mut self) {
        self.frame_after(FRAME_S);
    }

    pub fn frame_after(&mut self, dt: f64) {
        self.clock.advance(dt);
        let now = self.now();
        self.engine.on_frame(now);
    }

    /// Runs 60 Hz frames for `seconds`.
    pub fn run(&mut self, seconds: f64) {
        let frames = (seconds / FRAME_S).round() as usize;
        for _ in 0..frames {
            self.frame();
        }
    }

    /// Runs frames, completing every tile load the engine requests.
    pub fn run_loading(&mut self, seconds: f64) {
        let frames = (seconds / FRAME_S).round() as usize;
        for _ in 0..frames {
            self.frame();
            for call in self.engine.renderer_mut().take_calls() {
                if let RendererCall::LoadTile(key) = call {
                    self.send(RendererEvent::TileLoaded(key));
                }
            }
        }
    }

    pub fn events(&mut self) -> Vec<EngineEvent> {
        self.engine
            .drain_events()
            .into_iter()
            .map(|e| e.payload)
            .collect()
    }

    /// Screen position of an image point under the current camera.
    pub fn screen_of(&self, x: f64, y: f64) -> Vec2 {
        match self.engine.viewport() {
            Some(vp) => vp.image_to_screen(Vec2::new(x, y)),
            None => Vec2::new(x, y),
        }
    }
}
