use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::Vec3;

use crate::math::Triangle;

const DEFAULT_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

/// Triangulated Wavefront mesh
#[derive(Debug, Clone, Default)]
pub struct ObjMesh {
    pub triangles: Vec<Triangle>,
    /// Materials with a non-zero `Ke` emission, usable as lights
    pub emissive_centers: Vec<Vec3>,
}

/// Load an OBJ file and, if given, its material library.
///
/// Polygons are fan-triangulated. Only positions, faces, `usemtl` and the
/// `Kd`/`Ke` material terms are read.
pub fn load_obj(obj_path: &Path, mtl_path: Option<&Path>) -> Result<ObjMesh> {
    if obj_path.as_os_str().is_empty() {
        bail!("no OBJ file given");
    }
    let obj = std::fs::read_to_string(obj_path)
        .with_context(|| format!("failed to read OBJ file {}", obj_path.display()))?;

    let materials = match mtl_path.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read material file {}", path.display()))?;
            parse_mtl(&text)
        }
        None => HashMap::new(),
    };

    let mesh = parse_obj(&obj, &materials)
        .with_context(|| format!("failed to parse OBJ file {}", obj_path.display()))?;
    log::debug!(
        "loaded {} triangles from {}",
        mesh.triangles.len(),
        obj_path.display()
    );
    Ok(mesh)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MtlEntry {
    pub diffuse: Option<[f32; 3]>,
    pub emission: Option<[f32; 3]>,
}

pub fn parse_mtl(text: &str) -> HashMap<String, MtlEntry> {
    let mut materials = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines().map(str::trim) {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("newmtl") => {
                let name = parts.collect::<Vec<_>>().join(" ");
                materials.insert(name.clone(), MtlEntry::default());
                current = Some(name);
            }
            Some(key @ ("Kd" | "Ke")) => {
                let Some(entry) = current.as_ref().and_then(|n| materials.get_mut(n)) else {
                    continue;
                };
                let Some(rgb) = parse_rgb(parts) else {
                    continue;
                };
                if key == "Kd" {
                    entry.diffuse = Some(rgb);
                } else {
                    entry.emission = Some(rgb);
                }
            }
            _ => {}
        }
    }
    materials
}

fn parse_rgb<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let mut rgb = [0.0; 3];
    for c in &mut rgb {
        *c = parts.next()?.parse().ok()?;
    }
    Some(rgb)
}

pub fn parse_obj(text: &str, materials: &HashMap<String, MtlEntry>) -> Result<ObjMesh> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut mesh = ObjMesh::default();
    let mut material = MtlEntry::default();

    for (number, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords = parts
                    .take(3)
                    .map(str::parse::<f32>)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .with_context(|| format!("line {}: bad vertex", number + 1))?;
                let [x, y, z] = coords.as_slice() else {
                    bail!("line {}: vertex needs three coordinates", number + 1);
                };
                positions.push(Vec3::new(*x, *y, *z));
            }
            Some("usemtl") => {
                let name = parts.collect::<Vec<_>>().join(" ");
                material = materials.get(&name).copied().unwrap_or_default();
            }
            Some("f") => {
                let corners = parts
                    .map(|token| resolve_index(token, positions.len()))
                    .collect::<Option<Vec<_>>>()
                    .with_context(|| format!("line {}: bad face index", number + 1))?;
                if corners.len() < 3 {
                    bail!("line {}: face needs at least three vertices", number + 1);
                }
                let color = material.diffuse.unwrap_or(DEFAULT_COLOR);
                let start = mesh.triangles.len();
                for i in 1..corners.len() - 1 {
                    mesh.triangles.push(Triangle::new(
                        positions[corners[0]],
                        positions[corners[i]],
                        positions[corners[i + 1]],
                        color,
                    ));
                }
                if material.emission.is_some_and(|e| e.iter().any(|&c| c > 0.0)) {
                    let face = &mesh.triangles[start..];
                    let sum: Vec3 = face.iter().map(|t| (t.v0 + t.v1 + t.v2) / 3.0).sum();
                    mesh.emissive_centers.push(sum / face.len() as f32);
                }
            }
            _ => {}
        }
    }
    Ok(mesh)
}

/// `v`, `v/vt` or `v/vt/vn`, 1-based or negative relative
fn resolve_index(token: &str, count: usize) -> Option<usize> {
    let raw: i64 = token.split('/').next()?.parse().ok()?;
    let index = if raw < 0 {
        count as i64 + raw
    } else {
        raw - 1
    };
    (0..count as i64).contains(&index).then_some(index as usize)
}
