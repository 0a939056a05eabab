use glam::Vec3;

use super::ray::T_MIN;
use super::{Ray, AABB};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub color: Vec3,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, color: [f32; 3]) -> Self {
        Self {
            center,
            radius,
            color: Vec3::from_array(color),
        }
    }

    /// Nearest hit distance in front of the ray origin
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let oc = ray.origin - self.center;
        let a = ray.dir.dot(ray.dir);
        let half_b = oc.dot(ray.dir);
        let c = oc.dot(oc) - self.radius * self.radius;

        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_d = discriminant.sqrt();
        [(-half_b - sqrt_d) / a, (-half_b + sqrt_d) / a]
            .into_iter()
            .find(|&t| t > T_MIN)
    }

    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        (point - self.center).normalize()
    }

    pub fn bounds(&self) -> AABB {
        let r = Vec3::splat(self.radius);
        AABB::new(self.center - r, self.center + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_intersection_hit() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, [1.0, 0.0, 0.0]);
        let t = sphere.intersect(&Ray::new(Vec3::ZERO, Vec3::NEG_Z)).unwrap();
        assert!((t - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_sphere_intersection_miss() {
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, [1.0, 0.0, 0.0]);
        assert!(sphere.intersect(&Ray::new(Vec3::ZERO, Vec3::X)).is_none());
    }

    #[test]
    fn test_sphere_intersection_from_inside() {
        let sphere = Sphere::new(Vec3::ZERO, 5.0, [1.0, 0.0, 0.0]);
        let t = sphere.intersect(&Ray::new(Vec3::ZERO, Vec3::X)).unwrap();
        assert!((t - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_sphere_normal_and_bounds() {
        let sphere = Sphere::new(Vec3::ZERO, 2.0, [1.0, 1.0, 1.0]);
        let normal = sphere.normal_at(Vec3::new(2.0, 0.0, 0.0));
        assert!((normal - Vec3::X).length() < 0.01);
        assert_eq!(sphere.bounds().min, Vec3::splat(-2.0));
    }
}
