use glam::Vec3;

use super::AABB;

/// Hits closer than this are treated as self-intersections
pub const T_MIN: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Slab test; returns the entry distance, or the exit distance when the
    /// origin is inside the box
    pub fn intersect_aabb(&self, bounds: &AABB) -> Option<f32> {
        const EPSILON: f32 = 1e-8;

        let inv = |d: f32| {
            if d.abs() < EPSILON {
                1.0 / EPSILON.copysign(d)
            } else {
                1.0 / d
            }
        };
        let inv_dir = Vec3::new(inv(self.dir.x), inv(self.dir.y), inv(self.dir.z));

        let t0 = (bounds.min - self.origin) * inv_dir;
        let t1 = (bounds.max - self.origin) * inv_dir;
        let near = t0.min(t1).max_element();
        let far = t0.max(t1).min_element();

        if near > far || far < 0.0 {
            return None;
        }
        if near < 0.0 {
            (far > T_MIN).then_some(far)
        } else {
            Some(near)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_direction_is_normalised() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0));
        assert!((ray.dir.length() - 1.0).abs() < 1e-5);
        assert!((ray.at(5.0) - Vec3::new(3.0, 0.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn test_intersect_aabb_hit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let bounds = AABB::new(Vec3::new(5.0, -1.0, -1.0), Vec3::new(10.0, 1.0, 1.0));
        let t = ray.intersect_aabb(&bounds).unwrap();
        assert!((t - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_intersect_aabb_miss() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let bounds = AABB::new(Vec3::new(5.0, 2.0, 2.0), Vec3::new(10.0, 3.0, 3.0));
        assert!(ray.intersect_aabb(&bounds).is_none());
    }

    #[test]
    fn test_intersect_aabb_from_inside() {
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::X);
        let bounds = AABB::new(Vec3::new(0.0, -1.0, -1.0), Vec3::new(10.0, 1.0, 1.0));
        let t = ray.intersect_aabb(&bounds).unwrap();
        assert!((t - 5.0).abs() < 0.01);
    }
}
