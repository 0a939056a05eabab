use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::Vec3;

use crate::math::{Ray, AABB};

/// Pinhole camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub fov_degrees: f32,
}

impl Camera {
    pub fn new(position: Vec3, look_at: Vec3, fov_degrees: f32) -> Self {
        Self {
            position,
            look_at,
            fov_degrees,
        }
    }

    /// Camera in front of `bounds` that keeps the whole box in view
    pub fn framing(bounds: &AABB) -> Self {
        if bounds.is_empty() {
            return Self::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, 60.0);
        }
        let center = bounds.center();
        let radius = (bounds.extent().length() * 0.5).max(1e-3);
        let distance = radius / (30.0f32.to_radians()).tan() + radius;
        Self::new(center + Vec3::Z * distance, center, 60.0)
    }

    /// Read a camera description.
    ///
    /// One setting per line: `position x y z`, `look_at x y z`, `fov degrees`.
    /// Missing settings keep the values of `fallback`; `#` starts a comment.
    pub fn from_file(path: &Path, fallback: Camera) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read camera file {}", path.display()))?;
        let mut camera = fallback;
        for (number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else {
                continue;
            };
            let values = parts
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("{}:{}: bad number", path.display(), number + 1))?;
            match (key, values.as_slice()) {
                ("position", [x, y, z]) => camera.position = Vec3::new(*x, *y, *z),
                ("look_at", [x, y, z]) => camera.look_at = Vec3::new(*x, *y, *z),
                ("fov", [deg]) => camera.fov_degrees = *deg,
                _ => bail!("{}:{}: unknown setting '{line}'", path.display(), number + 1),
            }
        }
        Ok(camera)
    }

    pub fn forward(&self) -> Vec3 {
        (self.look_at - self.position).normalize_or_zero()
    }

    pub fn right(&self) -> Vec3 {
        let right = self.forward().cross(Vec3::Y);
        if right.length_squared() < 1e-8 {
            Vec3::X
        } else {
            right.normalize()
        }
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Ray through normalised image coordinates, `(0, 0)` top-left
    pub fn primary_ray(&self, u: f32, v: f32, aspect: f32) -> Ray {
        let half_h = (self.fov_degrees.to_radians() * 0.5).tan();
        let half_w = half_h * aspect;
        let x = (2.0 * u - 1.0) * half_w;
        let y = (1.0 - 2.0 * v) * half_h;
        Ray::new(
            self.position,
            self.forward() + self.right() * x + self.up() * y,
        )
    }

    /// Project a world point to normalised image coordinates plus depth.
    ///
    /// `None` for points behind the camera.
    pub fn project(&self, point: Vec3, aspect: f32) -> Option<(f32, f32, f32)> {
        let rel = point - self.position;
        let depth = rel.dot(self.forward());
        if depth <= 1e-4 {
            return None;
        }
        let half_h = (self.fov_degrees.to_radians() * 0.5).tan();
        let half_w = half_h * aspect;
        let x = rel.dot(self.right()) / depth / half_w;
        let y = rel.dot(self.up()) / depth / half_h;
        Some(((x + 1.0) * 0.5, (1.0 - y) * 0.5, depth))
    }
}
