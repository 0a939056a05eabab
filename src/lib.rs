pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod display;
pub mod engines;
pub mod error;
pub mod loaders;
pub mod logging;
pub mod math;
pub mod scenes;
pub mod settings;
pub mod traits;

pub use config::{Accelerator, RenderConfig, RenderConfigBuilder, Scene, Shader};
pub use crate::core::{RenderCoordinator, RenderEvent, RenderState, StartOutcome, StatusSnapshot};
pub use display::HeadlessSurface;
pub use error::{RenderError, RenderResult};
pub use settings::CoordinatorSettings;
