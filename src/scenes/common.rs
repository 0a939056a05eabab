use glam::Vec3;

use crate::math::Triangle;

/// Two triangles covering the parallelogram `corner, corner + a, corner + a + b, corner + b`
pub fn quad(corner: Vec3, a: Vec3, b: Vec3, color: [f32; 3]) -> [Triangle; 2] {
    [
        Triangle::new(corner, corner + a, corner + a + b, color),
        Triangle::new(corner, corner + a + b, corner + b, color),
    ]
}
