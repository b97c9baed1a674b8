pub mod cutout;
pub mod overlay;
pub mod profile;
pub mod score;
pub mod session;
pub mod spring;
pub mod transition;

pub use cutout::*;
pub use overlay::*;
pub use profile::*;
pub use score::*;
pub use session::*;
pub use spring::*;
pub use transition::*;
