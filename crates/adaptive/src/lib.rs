pub mod manager;
pub mod policy;
pub mod pressure;
pub mod profile;
pub mod telemetry;

pub use manager::*;
pub use policy::*;
pub use pressure::*;
pub use profile::*;
pub use telemetry::*;
