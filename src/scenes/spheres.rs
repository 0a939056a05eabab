use glam::Vec3;

use super::{quad, Light, SceneGeometry};
use crate::camera::Camera;
use crate::math::{hsv_to_rgb, Sphere};

/// Spheres resting on a ground plane; the dense variant lays out a grid
pub fn create_spheres_scene(dense: bool) -> SceneGeometry {
    let mut triangles = Vec::new();
    triangles.extend(quad(
        Vec3::new(-10.0, -1.0, 10.0),
        Vec3::X * 20.0,
        Vec3::NEG_Z * 20.0,
        [0.4, 0.4, 0.4],
    ));

    let spheres = if dense {
        let n = 6;
        (0..n * n)
            .map(|i| {
                let (gx, gz) = ((i % n) as f32, (i / n) as f32);
                let center = Vec3::new(gx - (n as f32 - 1.0) * 0.5, -0.7, -gz - 1.0);
                Sphere::new(center, 0.3, hsv_to_rgb(i as f32 / (n * n) as f32, 0.7, 0.9))
            })
            .collect()
    } else {
        vec![
            Sphere::new(Vec3::new(-1.5, 0.0, -3.0), 1.0, [0.9, 0.2, 0.2]),
            Sphere::new(Vec3::new(0.5, -0.4, -2.0), 0.6, [0.2, 0.8, 0.3]),
            Sphere::new(Vec3::new(1.6, -0.2, -4.0), 0.8, [0.2, 0.3, 0.9]),
            Sphere::new(Vec3::new(0.0, 1.2, -5.0), 1.0, [0.9, 0.9, 0.9]),
        ]
    };

    let mut lights = vec![Light::new(Vec3::new(2.0, 4.0, 1.0), 1.0)];
    if dense {
        lights.push(Light::new(Vec3::new(-3.0, 3.0, -2.0), 0.5));
    }

    SceneGeometry {
        spheres,
        triangles,
        lights,
        camera: Some(Camera::new(Vec3::new(0.0, 0.5, 3.0), Vec3::new(0.0, 0.0, -3.0), 60.0)),
    }
}
