use std::collections::HashMap;
use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};

/// Floats per vertex: position.xyz, normal.xyz, uv.
pub const VERTEX_STRIDE: usize = 8;

/// CPU-side mesh group ready for upload: interleaved
/// `position.xyz normal.xyz uv.xy` vertices plus triangle indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Diffuse texture resolved from the material library, if any.
    pub texture: Option<PathBuf>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

/// Loads an OBJ file and returns its groups in file order.
///
/// Material libraries referenced by `mtllib` are resolved relative to the
/// OBJ file; a missing library is logged and ignored (the groups then carry
/// no texture), but a missing OBJ is an error.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Vec<MeshData>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read mesh {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut materials = HashMap::new();
    for line in data.lines() {
        if let Some(library) = line.trim().strip_prefix("mtllib ") {
            let library_path = base.join(library.trim());
            match fs::read_to_string(&library_path) {
                Ok(mtl) => materials.extend(parse_mtl(&mtl, base)),
                Err(err) => {
                    log::warn!(
                        "material library {} unavailable: {err}",
                        library_path.display()
                    );
                }
            }
        }
    }

    parse_obj(&data, &materials).with_context(|| format!("failed to parse {}", path.display()))
}

/// Maps material names to their diffuse texture paths.
fn parse_mtl(data: &str, base: &Path) -> HashMap<String, PathBuf> {
    let mut textures = HashMap::new();
    let mut current: Option<String> = None;
    for line in data.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("newmtl ") {
            current = Some(name.trim().to_string());
        } else if let Some(map) = trimmed.strip_prefix("map_Kd ") {
            if let Some(name) = current.as_ref() {
                textures.insert(name.clone(), base.join(map.trim()));
            }
        }
    }
    textures
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Default)]
struct RawGroup {
    name: String,
    material: Option<String>,
    faces: Vec<[FaceIndex; 3]>,
}

/// Parses OBJ text into one `MeshData` per object/material group.
pub fn parse_obj(data: &str, materials: &HashMap<String, PathBuf>) -> Result<Vec<MeshData>> {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut normals = Vec::new();
    let mut groups: Vec<RawGroup> = Vec::new();
    let mut current = RawGroup::default();

    let mut flush = |groups: &mut Vec<RawGroup>, current: &mut RawGroup| {
        if !current.faces.is_empty() {
            groups.push(std::mem::take(current));
        }
    };

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vt" => uvs.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid uv on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "o" | "g" => {
                flush(&mut groups, &mut current);
                current.name = parts.next().unwrap_or("").to_string();
            }
            "usemtl" => {
                let material = parts.next().map(str::to_string);
                if material != current.material {
                    let name = current.name.clone();
                    flush(&mut groups, &mut current);
                    current.name = name;
                    current.material = material;
                }
            }
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate(&polygon, &mut current.faces);
            }
            _ => {}
        }
    }
    flush(&mut groups, &mut current);

    if positions.is_empty() {
        return Err(anyhow!("OBJ data does not define any vertices"));
    }
    if groups.is_empty() {
        return Err(anyhow!("OBJ data does not define any faces"));
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| {
            let mut mesh = build_group(&positions, &uvs, &normals, &group.faces)?;
            mesh.name = if group.name.is_empty() {
                format!("group{index}")
            } else {
                group.name
            };
            mesh.texture = group
                .material
                .as_ref()
                .and_then(|name| materials.get(name).cloned());
            if needs_normals(&mesh.vertices) {
                compute_normals(&mut mesh);
            }
            Ok(mesh)
        })
        .collect()
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing uv component"))?
            .parse::<f32>()?)
    };
    Ok(Vec2::new(component()?, component()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let vn = segments
            .next()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn triangulate(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

fn build_group(
    positions: &[Vec3],
    uvs: &[Vec2],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<MeshData> {
    let mut lookup: HashMap<VertexKey, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for index in face {
            let position = fix_index(index.v, positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", index.v))?;
            let key = VertexKey {
                position,
                uv: fix_index(index.vt, uvs.len()),
                normal: fix_index(index.vn, normals.len()),
            };
            let next = (vertices.len() / VERTEX_STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = positions[key.position];
                let n = key.normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                let t = key.uv.map(|i| uvs[i]).unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, t.x, t.y]);
                next
            });
            indices.push(*entry);
        }
    }

    Ok(MeshData {
        vertices,
        indices,
        ..MeshData::default()
    })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let from_end = (-index) as usize;
        (from_end <= len).then_some(len - from_end)
    } else {
        None
    }
}

fn needs_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(VERTEX_STRIDE)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

fn compute_normals(mesh: &mut MeshData) {
    let vertex_count = mesh.vertex_count();
    let mut accumulated = vec![Vec3::ZERO; vertex_count];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let at = |i: usize| Vec3::from_slice(&mesh.vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3]);
        let normal = (at(i1) - at(i0)).cross(at(i2) - at(i0));
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accumulated[i0] += normal;
            accumulated[i1] += normal;
            accumulated[i2] += normal;
        }
    }

    for (i, normal) in accumulated.into_iter().enumerate() {
        let normal = normal.normalize_or_zero();
        mesh.vertices[i * VERTEX_STRIDE + 3] = normal.x;
        mesh.vertices[i * VERTEX_STRIDE + 4] = normal.y;
        mesh.vertices[i * VERTEX_STRIDE + 5] = normal.z;
    }
}

/// Unit cube used for spot bulbs and the skybox shell.
pub fn cube() -> MeshData {
    // face = (normal, four corners counter-clockwise seen from outside)
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (
            Vec3::Z,
            corners([0, 1, 1], [1, 0, 1], [1, 1, 1], [0, 0, 1]),
        ),
        (
            Vec3::NEG_Z,
            corners([1, 1, 0], [0, 0, 0], [0, 1, 0], [1, 0, 0]),
        ),
        (
            Vec3::X,
            corners([1, 1, 1], [1, 0, 0], [1, 1, 0], [1, 0, 1]),
        ),
        (
            Vec3::NEG_X,
            corners([0, 1, 0], [0, 0, 1], [0, 1, 1], [0, 0, 0]),
        ),
        (
            Vec3::Y,
            corners([0, 1, 0], [1, 1, 1], [1, 1, 0], [0, 1, 1]),
        ),
        (
            Vec3::NEG_Y,
            corners([0, 0, 1], [1, 0, 0], [1, 0, 1], [0, 0, 0]),
        ),
    ];

    let mut mesh = MeshData {
        name: "cube".to_string(),
        ..MeshData::default()
    };
    let uv = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
    ];
    for (normal, quad) in faces {
        let base = mesh.vertex_count() as u32;
        for (corner, tex) in quad.iter().zip(uv) {
            mesh.vertices.extend_from_slice(&[
                corner.x, corner.y, corner.z, normal.x, normal.y, normal.z, tex.x, tex.y,
            ]);
        }
        // two triangles sharing the diagonal corner pair
        mesh.indices
            .extend_from_slice(&[base, base + 2, base + 1, base, base + 1, base + 3]);
    }
    mesh
}

fn corners(a: [i32; 3], b: [i32; 3], c: [i32; 3], d: [i32; 3]) -> [Vec3; 4] {
    let to_unit = |v: [i32; 3]| Vec3::new(v[0] as f32 - 0.5, v[1] as f32 - 0.5, v[2] as f32 - 0.5);
    [to_unit(a), to_unit(b), to_unit(c), to_unit(d)]
}

/// Unit UV sphere used for point-light bulbs.
pub fn sphere() -> MeshData {
    const STACKS: u32 = 16;
    const SECTORS: u32 = 24;

    let mut mesh = MeshData {
        name: "sphere".to_string(),
        ..MeshData::default()
    };

    for stack in 0..=STACKS {
        let phi = PI / 2.0 - PI * stack as f32 / STACKS as f32;
        for sector in 0..=SECTORS {
            let theta = 2.0 * PI * sector as f32 / SECTORS as f32;
            let normal = Vec3::new(phi.cos() * theta.cos(), phi.sin(), phi.cos() * theta.sin());
            let position = normal * 0.5;
            mesh.vertices.extend_from_slice(&[
                position.x,
                position.y,
                position.z,
                normal.x,
                normal.y,
                normal.z,
                sector as f32 / SECTORS as f32,
                stack as f32 / STACKS as f32,
            ]);
        }
    }

    for stack in 0..STACKS {
        for sector in 0..SECTORS {
            let row = stack * (SECTORS + 1) + sector;
            let next_row = row + SECTORS + 1;
            if stack != 0 {
                mesh.indices.extend_from_slice(&[row, next_row, row + 1]);
            }
            if stack != STACKS - 1 {
                mesh.indices
                    .extend_from_slice(&[row + 1, next_row, next_row + 1]);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_textured_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";
        let groups = parse_obj(obj, &HashMap::new()).unwrap();
        assert_eq!(groups.len(), 1);
        let mesh = &groups[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertex_count(), 3);
        // second vertex carries uv (1, 0)
        assert_eq!(mesh.vertices[VERTEX_STRIDE + 6], 1.0);
        assert_eq!(mesh.vertices[VERTEX_STRIDE + 7], 0.0);
    }

    #[test]
    fn quads_are_triangulated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let groups = parse_obj(obj, &HashMap::new()).unwrap();
        assert_eq!(groups[0].indices.len(), 6);
    }

    #[test]
    fn missing_normals_are_computed() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let groups = parse_obj(obj, &HashMap::new()).unwrap();
        for chunk in groups[0].vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn material_switch_starts_a_new_group() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl brick\nf 1 2 3\nusemtl glass\nf 1 3 2\n";
        let mut materials = HashMap::new();
        materials.insert("glass".to_string(), PathBuf::from("glass.png"));
        let groups = parse_obj(obj, &materials).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].texture, None);
        assert_eq!(groups[1].texture, Some(PathBuf::from("glass.png")));
    }

    #[test]
    fn empty_obj_is_an_error() {
        assert!(parse_obj("# nothing here\n", &HashMap::new()).is_err());
    }

    #[test]
    fn mtl_maps_names_to_textures() {
        let mtl = "newmtl wall\nKd 1 1 1\nmap_Kd textures/wall.png\n";
        let map = parse_mtl(mtl, Path::new("assets"));
        assert_eq!(
            map.get("wall"),
            Some(&PathBuf::from("assets/textures/wall.png"))
        );
    }

    #[test]
    fn primitives_are_well_formed() {
        for mesh in [cube(), sphere()] {
            assert!(mesh.indices.len() % 3 == 0);
            let max = *mesh.indices.iter().max().unwrap() as usize;
            assert!(max < mesh.vertex_count());
            for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE) {
                let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
                assert!((normal.length() - 1.0).abs() < 1e-4);
            }
        }
    }
}
