pub mod engine;
pub mod memory_probe;
pub mod status_sink;
pub mod surface;

pub use engine::*;
pub use memory_probe::*;
pub use status_sink::*;
pub use surface::*;
