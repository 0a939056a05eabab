// Flat-shaded raster preview of the loaded scene

use glam::Vec2;

use crate::camera::Camera;
use crate::core::bitmap::Bitmap;
use crate::math::to_rgba8;
use crate::scenes::SceneGeometry;

pub fn rasterize(geometry: &SceneGeometry, camera: &Camera, target: &mut Bitmap) {
    let (width, height) = target.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let aspect = width as f32 / height as f32;
    let size = Vec2::new(width as f32, height as f32);
    let mut depth = vec![f32::INFINITY; width as usize * height as usize];
    let view = camera.forward();

    for triangle in &geometry.triangles {
        let projected: Option<Vec<(Vec2, f32)>> = [triangle.v0, triangle.v1, triangle.v2]
            .into_iter()
            .map(|v| camera.project(v, aspect).map(|(u, w, d)| (Vec2::new(u, w) * size, d)))
            .collect();
        let Some(p) = projected else {
            continue;
        };
        let shade = 0.25 + 0.75 * triangle.normal().dot(view).abs();
        let color = to_rgba8(triangle.color * shade);
        fill_triangle(target, &mut depth, [p[0], p[1], p[2]], color);
    }

    for sphere in &geometry.spheres {
        let Some((u, v, d)) = camera.project(sphere.center, aspect) else {
            continue;
        };
        let half_h = (camera.fov_degrees.to_radians() * 0.5).tan();
        let radius_px = sphere.radius / d / half_h * size.y * 0.5;
        fill_disc(
            target,
            &mut depth,
            Vec2::new(u, v) * size,
            radius_px,
            d - sphere.radius,
            to_rgba8(sphere.color),
        );
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

fn fill_triangle(target: &mut Bitmap, depth: &mut [f32], p: [(Vec2, f32); 3], color: [u8; 4]) {
    let (width, height) = target.dimensions();
    let [(a, da), (b, db), (c, dc)] = p;
    let area = edge(a, b, c);
    if area.abs() < 1e-6 {
        return;
    }

    let min = a.min(b).min(c).max(Vec2::ZERO);
    let max = a.max(b).max(c).min(Vec2::new(width as f32 - 1.0, height as f32 - 1.0));
    if min.x > max.x || min.y > max.y {
        return;
    }

    for y in min.y as u32..=max.y as u32 {
        for x in min.x as u32..=max.x as u32 {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(b, c, point) / area;
            let w1 = edge(c, a, point) / area;
            let w2 = edge(a, b, point) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * da + w1 * db + w2 * dc;
            let index = (y * width + x) as usize;
            if z < depth[index] {
                depth[index] = z;
                target.put_pixel(x, y, color);
            }
        }
    }
}

fn fill_disc(
    target: &mut Bitmap,
    depth: &mut [f32],
    center: Vec2,
    radius: f32,
    z: f32,
    color: [u8; 4],
) {
    let (width, height) = target.dimensions();
    let min = (center - Vec2::splat(radius)).max(Vec2::ZERO);
    let max = (center + Vec2::splat(radius)).min(Vec2::new(width as f32 - 1.0, height as f32 - 1.0));
    if min.x > max.x || min.y > max.y {
        return;
    }

    for y in min.y as u32..=max.y as u32 {
        for x in min.x as u32..=max.x as u32 {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if point.distance_squared(center) > radius * radius {
                continue;
            }
            let index = (y * width + x) as usize;
            if z < depth[index] {
                depth[index] = z;
                target.put_pixel(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::core::bitmap::BLACK;
    use crate::math::Sphere;

    #[test]
    fn test_sphere_in_front_covers_center_pixel() {
        let geometry = SceneGeometry {
            spheres: vec![Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, [1.0, 0.0, 0.0])],
            ..Default::default()
        };
        let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, 60.0);
        let mut target = Bitmap::new(32, 32);
        rasterize(&geometry, &camera, &mut target);

        assert_eq!(target.pixel(16, 16), Some([255, 0, 0, 255]));
        assert_eq!(target.pixel(0, 0), Some(BLACK));
    }

    #[test]
    fn test_nearer_triangle_wins() {
        let far = crate::scenes::quad(
            Vec3::new(-5.0, -5.0, -6.0),
            Vec3::X * 10.0,
            Vec3::Y * 10.0,
            [0.0, 0.0, 1.0],
        );
        let near = crate::scenes::quad(
            Vec3::new(-1.0, -1.0, -2.0),
            Vec3::X * 2.0,
            Vec3::Y * 2.0,
            [0.0, 1.0, 0.0],
        );
        let geometry = SceneGeometry {
            triangles: far.into_iter().chain(near).collect(),
            ..Default::default()
        };
        let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, 60.0);
        let mut target = Bitmap::new(16, 16);
        rasterize(&geometry, &camera, &mut target);

        let center = target.pixel(8, 8).unwrap();
        assert!(center[1] > 0 && center[2] == 0);
    }
}
