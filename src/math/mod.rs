mod aabb;
mod color;
mod ray;
mod sphere;
mod triangle;

pub use aabb::AABB;
pub use color::{hsv_to_rgb, to_rgba8};
pub use ray::Ray;
pub use sphere::Sphere;
pub use triangle::{moller_trumbore_intersect, Triangle, TriangleHit};
