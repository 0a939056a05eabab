// Built-in scenes and the geometry the software engine traces

mod common;
mod cornell;
mod spheres;

use glam::Vec3;

use crate::camera::Camera;
use crate::config::Scene;
use crate::math::{Ray, Sphere, Triangle, AABB};

pub use common::quad;
pub use cornell::create_cornell_scene;
pub use spheres::create_spheres_scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub intensity: Vec3,
}

impl Light {
    pub fn new(position: Vec3, intensity: f32) -> Self {
        Self {
            position,
            intensity: Vec3::splat(intensity),
        }
    }
}

/// Closest intersection along a ray
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub spheres: Vec<Sphere>,
    pub triangles: Vec<Triangle>,
    pub lights: Vec<Light>,
    pub camera: Option<Camera>,
}

impl SceneGeometry {
    pub fn primitive_count(&self) -> u32 {
        (self.spheres.len() + self.triangles.len()) as u32
    }

    pub fn bounds(&self) -> AABB {
        self.spheres
            .iter()
            .map(Sphere::bounds)
            .chain(self.triangles.iter().map(Triangle::bounds))
            .fold(AABB::empty(), |acc, b| acc.union(&b))
    }

    /// Camera set by the scene, or one framing its bounds
    pub fn camera(&self) -> Camera {
        self.camera.unwrap_or_else(|| Camera::framing(&self.bounds()))
    }

    /// Rough resident size of the scene in bytes
    pub fn estimated_bytes(&self) -> u64 {
        (self.spheres.len() * std::mem::size_of::<Sphere>()
            + self.triangles.len() * std::mem::size_of::<Triangle>()
            + self.lights.len() * std::mem::size_of::<Light>()) as u64
    }

    /// Linear scan over every primitive
    pub fn intersect(&self, ray: &Ray, max_t: f32) -> Option<Hit> {
        let mut best: Option<(f32, Vec3, Vec3)> = None;
        let mut closest = max_t;

        for sphere in &self.spheres {
            if let Some(t) = sphere.intersect(ray).filter(|&t| t < closest) {
                closest = t;
                best = Some((t, sphere.normal_at(ray.at(t)), sphere.color));
            }
        }
        for triangle in &self.triangles {
            if let Some(t) = triangle.intersect(ray).filter(|&t| t < closest) {
                closest = t;
                best = Some((t, triangle.normal(), triangle.color));
            }
        }

        best.map(|(t, normal, color)| {
            // shade both faces of triangles
            let normal = if normal.dot(ray.dir) > 0.0 { -normal } else { normal };
            Hit {
                t,
                point: ray.at(t),
                normal,
                color,
            }
        })
    }

    pub fn occluded(&self, ray: &Ray, max_t: f32) -> bool {
        self.spheres
            .iter()
            .any(|s| s.intersect(ray).is_some_and(|t| t < max_t))
            || self
                .triangles
                .iter()
                .any(|tri| tri.intersect(ray).is_some_and(|t| t < max_t))
    }
}

/// Geometry for a built-in scene; `None` for scenes read from files
pub fn create_builtin_scene(scene: Scene) -> Option<SceneGeometry> {
    match scene {
        Scene::Cornell => Some(create_cornell_scene(false)),
        Scene::Cornell2 => Some(create_cornell_scene(true)),
        Scene::Spheres => Some(create_spheres_scene(false)),
        Scene::Spheres2 => Some(create_spheres_scene(true)),
        Scene::Obj | Scene::TestInternal | Scene::TestSdCard | Scene::WrongFile => None,
    }
}
