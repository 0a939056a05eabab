// Per-request render parameters; the all-zero default is a legal request

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Built-in scenes known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    #[default]
    Cornell,
    Spheres,
    Cornell2,
    Spheres2,
    Obj,
    TestInternal,
    TestSdCard,
    WrongFile,
}

impl Scene {
    pub const ALL: [Scene; 8] = [
        Scene::Cornell,
        Scene::Spheres,
        Scene::Cornell2,
        Scene::Spheres2,
        Scene::Obj,
        Scene::TestInternal,
        Scene::TestSdCard,
        Scene::WrongFile,
    ];

    /// Numeric id handed across the engine boundary
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Scene::Cornell => "Cornell",
            Scene::Spheres => "Spheres",
            Scene::Cornell2 => "Cornell2",
            Scene::Spheres2 => "Spheres2",
            Scene::Obj => "OBJ",
            Scene::TestInternal => "Test internal",
            Scene::TestSdCard => "Test SD card",
            Scene::WrongFile => "Wrong file",
        }
    }

    /// Scenes whose geometry comes from an OBJ file instead of being built in
    pub fn loads_geometry(self) -> bool {
        matches!(
            self,
            Scene::Obj | Scene::TestInternal | Scene::TestSdCard | Scene::WrongFile
        )
    }
}

/// Shading model used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Shader {
    #[default]
    NoShadows,
    Whitted,
    PathTracer,
    DepthMap,
    Diffuse,
}

impl Shader {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Shader::NoShadows => "NoShadows",
            Shader::Whitted => "Whitted",
            Shader::PathTracer => "PathTracer",
            Shader::DepthMap => "DepthMap",
            Shader::Diffuse => "Diffuse",
        }
    }
}

/// Acceleration structure used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Accelerator {
    #[default]
    None,
    Naive,
    RegGrid,
    Bvh,
}

impl Accelerator {
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Accelerator::None => "None",
            Accelerator::Naive => "Naive",
            Accelerator::RegGrid => "RegGrid",
            Accelerator::Bvh => "BVH",
        }
    }
}

/// Immutable render request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    scene: Scene,
    shader: Shader,
    accelerator: Accelerator,
    width: i32,
    height: i32,
    samples_pixel: i32,
    samples_light: i32,
    num_threads: usize,
    rasterize: bool,
    obj_path: PathBuf,
    mat_path: PathBuf,
    cam_path: PathBuf,
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    pub fn shader(&self) -> Shader {
        self.shader
    }

    pub fn accelerator(&self) -> Accelerator {
        self.accelerator
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn samples_pixel(&self) -> i32 {
        self.samples_pixel
    }

    pub fn samples_light(&self) -> i32 {
        self.samples_light
    }

    /// Requested engine worker threads; 0 lets the coordinator pick
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Whether a raster preview pass runs before tracing starts
    pub fn rasterize(&self) -> bool {
        self.rasterize
    }

    pub fn obj_path(&self) -> &Path {
        &self.obj_path
    }

    pub fn mat_path(&self) -> &Path {
        &self.mat_path
    }

    pub fn cam_path(&self) -> &Path {
        &self.cam_path
    }

    /// Pixel count of the requested image, zero for degenerate sizes
    pub fn pixel_count(&self) -> usize {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} {}x{} spp={} spl={}",
            self.scene.name(),
            self.shader.name(),
            self.accelerator.name(),
            self.width,
            self.height,
            self.samples_pixel,
            self.samples_light
        )
    }
}

/// Fluent builder for [`RenderConfig`]
#[derive(Debug, Clone, Default)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn scene(mut self, scene: Scene) -> Self {
        self.config.scene = scene;
        self
    }

    pub fn shader(mut self, shader: Shader) -> Self {
        self.config.shader = shader;
        self
    }

    pub fn accelerator(mut self, accelerator: Accelerator) -> Self {
        self.config.accelerator = accelerator;
        self
    }

    /// Set output resolution
    pub fn resolution(mut self, width: i32, height: i32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Set samples per pixel and samples per light
    pub fn samples(mut self, samples_pixel: i32, samples_light: i32) -> Self {
        self.config.samples_pixel = samples_pixel;
        self.config.samples_light = samples_light;
        self
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    pub fn rasterize(mut self, rasterize: bool) -> Self {
        self.config.rasterize = rasterize;
        self
    }

    pub fn obj_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.obj_path = path.into();
        self
    }

    pub fn mat_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mat_path = path.into();
        self
    }

    pub fn cam_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cam_path = path.into();
        self
    }

    pub fn build(self) -> RenderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_all_zero() {
        let config = RenderConfig::builder().build();
        assert_eq!(config.scene().id(), 0);
        assert_eq!(config.shader().id(), 0);
        assert_eq!(config.accelerator().id(), 0);
        assert_eq!((config.width(), config.height()), (0, 0));
        assert_eq!(config.pixel_count(), 0);
        assert!(config.obj_path().as_os_str().is_empty());
        assert!(!config.rasterize());
    }

    #[test]
    fn builder_sets_every_field() {
        let config = RenderConfig::builder()
            .scene(Scene::Obj)
            .shader(Shader::PathTracer)
            .accelerator(Accelerator::Bvh)
            .resolution(320, 240)
            .samples(4, 2)
            .num_threads(3)
            .rasterize(true)
            .obj_path("teapot.obj")
            .mat_path("teapot.mtl")
            .cam_path("teapot.cam")
            .build();

        assert_eq!(config.scene(), Scene::Obj);
        assert_eq!(config.shader(), Shader::PathTracer);
        assert_eq!(config.accelerator(), Accelerator::Bvh);
        assert_eq!(config.pixel_count(), 320 * 240);
        assert_eq!((config.samples_pixel(), config.samples_light()), (4, 2));
        assert_eq!(config.num_threads(), 3);
        assert!(config.rasterize());
        assert_eq!(config.obj_path(), Path::new("teapot.obj"));
        assert_eq!(config.mat_path(), Path::new("teapot.mtl"));
        assert_eq!(config.cam_path(), Path::new("teapot.cam"));
    }

    #[test]
    fn ids_follow_catalogue_order() {
        assert_eq!(Scene::Obj.id(), 4);
        assert_eq!(Shader::Diffuse.id(), 4);
        assert_eq!(Accelerator::Bvh.id(), 3);
        assert_eq!(Scene::ALL.len(), 8);
    }

    #[test]
    fn negative_resolution_has_no_pixels() {
        let config = RenderConfig::builder().resolution(-4, 10).build();
        assert_eq!(config.pixel_count(), 0);
    }

    #[test]
    fn display_summarises_request() {
        let config = RenderConfig::builder()
            .scene(Scene::Spheres)
            .resolution(8, 6)
            .build();
        let text = config.to_string();
        assert!(text.contains("Spheres"));
        assert!(text.contains("8x6"));
    }
}
