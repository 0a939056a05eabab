// cli.rs - Command-line interface configuration
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{Accelerator, RenderConfig, Scene, Shader};
use crate::error::RenderResult;
use crate::settings::CoordinatorSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "render-host")]
#[command(about = "Headless render host for the progressive ray tracer", long_about = None)]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = Scene::Cornell)]
    pub scene: Scene,

    #[arg(long, value_enum, default_value_t = Shader::Whitted)]
    pub shader: Shader,

    #[arg(long, value_enum, default_value_t = Accelerator::None)]
    pub accelerator: Accelerator,

    #[arg(long, default_value_t = 320)]
    pub width: i32,

    #[arg(long, default_value_t = 240)]
    pub height: i32,

    /// Samples per pixel
    #[arg(long, default_value_t = 8)]
    pub spp: i32,

    /// Samples per light
    #[arg(long, default_value_t = 1)]
    pub spl: i32,

    /// Worker threads, 0 uses the settings value
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Draw a raster preview before tracing
    #[arg(long, default_value = "false")]
    pub rasterize: bool,

    #[arg(long)]
    pub obj: Option<PathBuf>,

    #[arg(long)]
    pub mtl: Option<PathBuf>,

    #[arg(long)]
    pub cam: Option<PathBuf>,

    /// JSON file with coordinator settings
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Override the status poll period
    #[arg(long = "poll-ms")]
    pub poll_ms: Option<u64>,

    /// Cancel the render after this many milliseconds
    #[arg(long = "stop-after-ms")]
    pub stop_after_ms: Option<u64>,

    /// Give up waiting for the render after this many milliseconds
    #[arg(long = "timeout-ms", default_value_t = 120_000)]
    pub timeout_ms: u64,

    /// Print the final status snapshot as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Write the final image as binary PPM
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Disable per-tick status output
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Also send every status snapshot to the log at info level
    #[arg(long = "log-status", default_value = "false")]
    pub log_status: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    pub log: Option<String>,
}

impl Cli {
    pub fn render_config(&self) -> RenderConfig {
        let mut builder = RenderConfig::builder()
            .scene(self.scene)
            .shader(self.shader)
            .accelerator(self.accelerator)
            .resolution(self.width, self.height)
            .samples(self.spp, self.spl)
            .num_threads(self.threads)
            .rasterize(self.rasterize);
        if let Some(path) = &self.obj {
            builder = builder.obj_path(path);
        }
        if let Some(path) = &self.mtl {
            builder = builder.mat_path(path);
        }
        if let Some(path) = &self.cam {
            builder = builder.cam_path(path);
        }
        builder.build()
    }

    pub fn coordinator_settings(&self) -> RenderResult<CoordinatorSettings> {
        let mut settings = match &self.settings {
            Some(path) => CoordinatorSettings::from_json_file(path)?,
            None => CoordinatorSettings::default(),
        };
        if let Some(ms) = self.poll_ms.filter(|&ms| ms > 0) {
            settings = settings.with_poll_interval(Duration::from_millis(ms));
        }
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stop_after(&self) -> Option<Duration> {
        self.stop_after_ms.map(Duration::from_millis)
    }
}
