pub mod budget;
pub mod event_bus;
pub mod frame;
pub mod metrics;
pub mod offload;
pub mod timers;
pub mod work_queue;

pub use budget::*;
pub use event_bus::*;
pub use frame::*;
pub use metrics::*;
pub use offload::*;
pub use timers::*;
pub use work_queue::*;
