use glam::Vec3;

use crate::config::Shader;
use crate::math::Ray;
use crate::scenes::{Hit, SceneGeometry};

const BACKGROUND: Vec3 = Vec3::new(0.02, 0.02, 0.03);
const AMBIENT: f32 = 0.08;
const SHADOW_BIAS: f32 = 1e-3;

/// Integer hash, the only randomness the tracer needs
pub fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Uniform value in `[0, 1)`
pub fn unit(seed: u32) -> f32 {
    (hash(seed) >> 8) as f32 / (1u32 << 24) as f32
}

pub struct Shading<'a> {
    pub geometry: &'a SceneGeometry,
    pub shader: Shader,
    pub samples_light: u32,
    /// Longest distance a depth map maps to black
    pub max_depth: f32,
}

impl Shading<'_> {
    pub fn radiance(&self, ray: &Ray, seed: u32) -> Vec3 {
        let Some(hit) = self.geometry.intersect(ray, f32::INFINITY) else {
            return if self.shader == Shader::DepthMap {
                Vec3::ZERO
            } else {
                BACKGROUND
            };
        };

        match self.shader {
            Shader::DepthMap => Vec3::splat((1.0 - hit.t / self.max_depth).clamp(0.0, 1.0)),
            Shader::Diffuse => hit.color,
            Shader::NoShadows => self.direct(&hit, false),
            Shader::Whitted => self.direct(&hit, true),
            Shader::PathTracer => self.direct(&hit, true) + self.indirect(&hit, seed),
        }
    }

    fn direct(&self, hit: &Hit, shadows: bool) -> Vec3 {
        let mut light = Vec3::splat(AMBIENT);
        for source in &self.geometry.lights {
            let to_light = source.position - hit.point;
            let distance = to_light.length();
            let dir = to_light / distance;
            let cos = hit.normal.dot(dir);
            if cos <= 0.0 {
                continue;
            }
            if shadows {
                let shadow = Ray::new(hit.point + hit.normal * SHADOW_BIAS, dir);
                if self.geometry.occluded(&shadow, distance) {
                    continue;
                }
            }
            light += source.intensity * cos;
        }
        hit.color * light
    }

    /// One diffuse bounce, averaged over `samples_light` directions
    fn indirect(&self, hit: &Hit, seed: u32) -> Vec3 {
        let samples = self.samples_light.max(1);
        let mut sum = Vec3::ZERO;
        for k in 0..samples {
            let dir = cosine_direction(hit.normal, seed.wrapping_add(k * 7919));
            let bounce = Ray::new(hit.point + hit.normal * SHADOW_BIAS, dir);
            if let Some(next) = self.geometry.intersect(&bounce, f32::INFINITY) {
                sum += next.color * self.direct(&next, true);
            }
        }
        hit.color * sum * (0.5 / samples as f32)
    }
}

fn cosine_direction(normal: Vec3, seed: u32) -> Vec3 {
    let r1 = unit(seed);
    let r2 = unit(seed ^ 0x9e37_79b9);
    let phi = std::f32::consts::TAU * r1;
    let r = r2.sqrt();
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - r2).sqrt());

    let helper = if normal.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    let tangent = normal.cross(helper).normalize();
    let bitangent = normal.cross(tangent);
    (tangent * local.x + bitangent * local.y + normal * local.z).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Sphere;
    use crate::scenes::Light;

    fn lit_sphere() -> SceneGeometry {
        SceneGeometry {
            spheres: vec![Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, [1.0, 1.0, 1.0])],
            lights: vec![Light::new(Vec3::new(0.0, 0.0, 2.0), 1.0)],
            ..Default::default()
        }
    }

    fn shading(geometry: &SceneGeometry, shader: Shader) -> Shading<'_> {
        Shading {
            geometry,
            shader,
            samples_light: 2,
            max_depth: 10.0,
        }
    }

    #[test]
    fn test_unit_is_in_range() {
        for seed in 0..1000 {
            let v = unit(seed);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_miss_returns_background() {
        let geometry = lit_sphere();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(shading(&geometry, Shader::Whitted).radiance(&ray, 1), BACKGROUND);
        assert_eq!(shading(&geometry, Shader::DepthMap).radiance(&ray, 1), Vec3::ZERO);
    }

    #[test]
    fn test_facing_light_is_brighter_than_ambient() {
        let geometry = lit_sphere();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let c = shading(&geometry, Shader::NoShadows).radiance(&ray, 1);
        assert!(c.x > AMBIENT * 2.0);
    }

    #[test]
    fn test_depth_map_darkens_with_distance() {
        let geometry = lit_sphere();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let c = shading(&geometry, Shader::DepthMap).radiance(&ray, 1);
        assert!((c.x - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_cosine_direction_stays_in_hemisphere() {
        for seed in 0..200 {
            assert!(cosine_direction(Vec3::Y, seed).dot(Vec3::Y) >= 0.0);
        }
    }
}
