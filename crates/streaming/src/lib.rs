pub mod cache;
pub mod pipeline;
pub mod queue;
pub mod residency;
pub mod tile;

pub use cache::*;
pub use pipeline::*;
pub use queue::*;
pub use residency::*;
pub use tile::*;
