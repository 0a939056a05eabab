use glam::Vec3;

use super::{Ray, AABB};

#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// Möller-Trumbore ray-triangle intersection
pub fn moller_trumbore_intersect(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<TriangleHit> {
    const EPSILON: f32 = 1e-6;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.dir.cross(edge2);
    let a = edge1.dot(h);

    // parallel
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.dir.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t >= EPSILON).then_some(TriangleHit { t, u, v })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub color: Vec3,
}

impl Triangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, color: [f32; 3]) -> Self {
        Self {
            v0,
            v1,
            v2,
            color: Vec3::from_array(color),
        }
    }

    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        moller_trumbore_intersect(ray, self.v0, self.v1, self.v2).map(|hit| hit.t)
    }

    /// Geometric normal, counter-clockwise winding
    pub fn normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0).normalize_or_zero()
    }

    pub fn bounds(&self) -> AABB {
        let mut bounds = AABB::empty();
        for v in [self.v0, self.v1, self.v2] {
            bounds.grow(v);
        }
        bounds
    }
}
