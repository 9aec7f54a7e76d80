use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Mesh ready for buffer upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Reads an OBJ file from disk.
pub fn load_obj_file(path: &Path) -> Result<MeshData> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    parse_obj(&contents).with_context(|| format!("failed to parse OBJ mesh {}", path.display()))
}

/// Parses an OBJ document from memory.
///
/// Supports `v`, `vn` and `f` records, fan-triangulates polygons and
/// resolves negative (relative) indices. Texture coordinates are ignored;
/// faces without normals receive smooth vertex normals afterwards.
pub fn parse_obj(data: &str) -> Result<MeshData> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut corners: Vec<FaceRef> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            continue;
        };
        let describe = || format!("line {}", line_no + 1);
        match tag {
            "v" => positions.push(parse_triple(fields).with_context(describe)?),
            "vn" => normals.push(parse_triple(fields).with_context(describe)?),
            "f" => {
                let polygon: Vec<FaceRef> = fields
                    .map(parse_face_ref)
                    .collect::<Result<_>>()
                    .with_context(describe)?;
                if polygon.len() < 3 {
                    return Err(anyhow!(
                        "face with fewer than 3 vertices on line {}",
                        line_no + 1
                    ));
                }
                for i in 1..polygon.len() - 1 {
                    corners.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ data defines no vertices"));
    }

    let mut mesh = assemble(&positions, &normals, &corners)?;
    if mesh.vertices.iter().any(|v| v.normal == [0.0; 3]) {
        fill_smooth_normals(&mut mesh);
    }
    Ok(mesh)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceRef {
    position: i32,
    normal: i32,
}

fn parse_triple<'a>(mut fields: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        fields
            .next()
            .ok_or_else(|| anyhow!("missing component"))?
            .parse::<f32>()
            .map_err(Into::into)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

fn parse_face_ref(field: &str) -> Result<FaceRef> {
    // v, v/vt, v//vn or v/vt/vn; the texture slot is discarded.
    let mut slots = field.split('/');
    let position = slots
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("face corner missing a vertex index"))?
        .parse::<i32>()?;
    let _texture = slots.next();
    let normal = match slots.next() {
        Some(s) if !s.is_empty() => s.parse::<i32>()?,
        _ => 0,
    };
    Ok(FaceRef { position, normal })
}

fn assemble(positions: &[Vec3], normals: &[Vec3], corners: &[FaceRef]) -> Result<MeshData> {
    let mut dedup: HashMap<FaceRef, u32> = HashMap::new();
    let mut mesh = MeshData::default();

    for corner in corners {
        let index = match dedup.get(corner) {
            Some(index) => *index,
            None => {
                let position = resolve(corner.position, positions.len())
                    .ok_or_else(|| anyhow!("vertex index {} out of range", corner.position))?;
                let normal = resolve(corner.normal, normals.len())
                    .map(|i| normals[i])
                    .unwrap_or(Vec3::ZERO);
                let index = mesh.vertices.len() as u32;
                mesh.vertices.push(Vertex::new(positions[position], normal));
                dedup.insert(*corner, index);
                index
            }
        };
        mesh.indices.push(index);
    }

    Ok(mesh)
}

/// Maps a one-based (or negative relative) OBJ index to a slice offset.
fn resolve(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }
}

fn fill_smooth_normals(mesh: &mut MeshData) {
    let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];
    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let p0 = Vec3::from_array(mesh.vertices[i0].position);
        let p1 = Vec3::from_array(mesh.vertices[i1].position);
        let p2 = Vec3::from_array(mesh.vertices[i2].position);
        // Unnormalized cross product weighs large faces more heavily.
        let face_normal = (p1 - p0).cross(p2 - p0);
        if face_normal.length_squared() > f32::EPSILON {
            accum[i0] += face_normal;
            accum[i1] += face_normal;
            accum[i2] += face_normal;
        }
    }
    for (vertex, normal) in mesh.vertices.iter_mut().zip(accum) {
        if vertex.normal == [0.0; 3] {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }
}

/// Unit cube used when a mesh file is missing or malformed.
pub fn fallback_cube() -> MeshData {
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut mesh = MeshData::default();
    for (normal, tangent, bitangent) in faces {
        let base = mesh.vertices.len() as u32;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = normal * 0.5 + tangent * u + bitangent * v;
            mesh.vertices.push(Vertex::new(position, normal));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triangle_with_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn triangulates_quads() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn resolves_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(obj).unwrap();
        for vertex in &mesh.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal.length() - 1.0).abs() < 1e-5);
            assert!(normal.distance(Vec3::Z) < 1e-5);
        }
    }

    #[test]
    fn rejects_empty_documents() {
        assert!(parse_obj("# nothing here\n").is_err());
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let obj = "v 0 0 0\nf 1 2 3\n";
        assert!(parse_obj(obj).is_err());
    }

    #[test]
    fn fallback_cube_is_closed() {
        let cube = fallback_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for vertex in &cube.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal.length() - 1.0).abs() < 1e-6);
        }
    }
}
