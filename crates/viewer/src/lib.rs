pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod render_mode;
pub mod renderer;

pub use config::*;
pub use context::*;
pub use engine::*;
pub use events::*;
pub use render_mode::*;
pub use renderer::*;
