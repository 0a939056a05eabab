use glam::Vec3;

use super::{quad, Light, SceneGeometry};
use crate::camera::Camera;
use crate::math::Sphere;

const WHITE: [f32; 3] = [0.73, 0.73, 0.73];
const RED: [f32; 3] = [0.65, 0.05, 0.05];
const GREEN: [f32; 3] = [0.12, 0.45, 0.15];

/// Five-walled unit room with two spheres; the second variant adds a blue
/// back wall and a second light
pub fn create_cornell_scene(variant: bool) -> SceneGeometry {
    let mut triangles = Vec::new();
    let back = if variant { [0.1, 0.2, 0.6] } else { WHITE };

    // floor, ceiling, back, left, right
    triangles.extend(quad(Vec3::new(-1.0, -1.0, 1.0), Vec3::X * 2.0, Vec3::NEG_Z * 2.0, WHITE));
    triangles.extend(quad(Vec3::new(-1.0, 1.0, -1.0), Vec3::X * 2.0, Vec3::Z * 2.0, WHITE));
    triangles.extend(quad(Vec3::new(-1.0, -1.0, -1.0), Vec3::X * 2.0, Vec3::Y * 2.0, back));
    triangles.extend(quad(Vec3::new(-1.0, -1.0, 1.0), Vec3::NEG_Z * 2.0, Vec3::Y * 2.0, RED));
    triangles.extend(quad(Vec3::new(1.0, -1.0, -1.0), Vec3::Z * 2.0, Vec3::Y * 2.0, GREEN));

    let spheres = vec![
        Sphere::new(Vec3::new(-0.45, -0.65, -0.3), 0.35, [0.9, 0.9, 0.9]),
        Sphere::new(Vec3::new(0.45, -0.7, 0.25), 0.3, [0.8, 0.6, 0.2]),
    ];

    let mut lights = vec![Light::new(Vec3::new(0.0, 0.95, 0.0), 1.0)];
    if variant {
        lights.push(Light::new(Vec3::new(-0.6, 0.5, 0.8), 0.4));
    }

    SceneGeometry {
        spheres,
        triangles,
        lights,
        camera: Some(Camera::new(Vec3::new(0.0, 0.0, 3.4), Vec3::ZERO, 45.0)),
    }
}
