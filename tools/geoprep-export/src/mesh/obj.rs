//! OBJ mesh import
//!
//! Produces the unprocessed mesh: every face corner becomes its own vertex, laid out as
//! position(3) [normal(3)] [uv0(2)]. Welding the corners back together is the job of the
//! preparation pipeline.

use anyhow::{bail, Context, Result};
use geoprep_common::{Mesh, VertexLayout, VertexSemantic};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::formats::write_prepared_mesh_file;
use crate::pipeline::{prepare_mesh, PrepSettings, PreparedMesh};

/// Face corner: position index plus optional uv and normal indices (0-based)
type Corner = (usize, Option<usize>, Option<usize>);

/// Load an OBJ file as an unprocessed mesh
pub fn load_obj(input: &Path) -> Result<Mesh> {
    let file = File::open(input).with_context(|| format!("Failed to open OBJ: {:?}", input))?;
    let default_name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh");
    parse_obj(BufReader::new(file), default_name)
        .with_context(|| format!("Failed to parse OBJ: {:?}", input))
}

/// Load and prepare an OBJ file without writing anything
pub fn convert_obj_to_memory(input: &Path, settings: &PrepSettings) -> Result<PreparedMesh> {
    prepare_mesh(load_obj(input)?, settings)
}

/// Convert an OBJ file to a prepared mesh file
pub fn convert_obj(input: &Path, output: &Path, settings: &PrepSettings) -> Result<PreparedMesh> {
    let prepared = convert_obj_to_memory(input, settings)?;
    write_prepared_mesh_file(output, &prepared)?;

    tracing::info!(
        "Converted OBJ mesh: {} vertices, {} indices, {} channels -> {:?}",
        prepared.vertex_count,
        prepared.indices.len(),
        prepared.channels.len(),
        output
    );
    Ok(prepared)
}

/// Parse OBJ text into an unprocessed mesh
///
/// `default_name` is used when the file has no `o`/`g` statement.
pub fn parse_obj<R: BufRead>(reader: R, default_name: &str) -> Result<Mesh> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut name: Option<String> = None;
    let mut material: Option<String> = None;

    // Expanded from faces, one entry per triangle corner
    let mut corners: Vec<Corner> = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "v" if parts.len() >= 4 => positions.push(parse_floats(&parts[1..4])),
            "vt" if parts.len() >= 3 => tex_coords.push(parse_floats(&parts[1..3])),
            "vn" if parts.len() >= 4 => normals.push(parse_floats(&parts[1..4])),
            "o" | "g" if parts.len() >= 2 && name.is_none() => name = Some(parts[1..].join(" ")),
            "usemtl" if parts.len() >= 2 && material.is_none() => material = Some(parts[1].to_string()),
            "f" if parts.len() >= 4 => {
                let face: Vec<Corner> = parts[1..]
                    .iter()
                    .map(|v| {
                        parse_obj_vertex(v, positions.len(), tex_coords.len(), normals.len())
                            .with_context(|| format!("Invalid face vertex '{v}' on line {}", line_number + 1))
                    })
                    .collect::<Result<_>>()?;

                // Fan triangulation (convex polygons)
                for i in 1..face.len() - 1 {
                    corners.extend([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if corners.is_empty() {
        bail!("No faces found in OBJ file");
    }

    // A channel is kept only when every corner references it
    let has_normals = corners.iter().all(|c| c.2.is_some());
    let has_uvs = corners.iter().all(|c| c.1.is_some());

    let mut channels = vec![(VertexSemantic::Position, 3)];
    if has_normals {
        channels.push((VertexSemantic::Normal, 3));
    }
    if has_uvs {
        channels.push((VertexSemantic::Uv(0), 2));
    }
    let (layout, stride) = VertexLayout::interleaved(&channels);

    let mut vertices: Vec<f32> = Vec::with_capacity(corners.len() * stride as usize / 4);
    for &(vi, vti, vni) in &corners {
        vertices.extend_from_slice(&positions[vi]);
        if let (true, Some(ni)) = (has_normals, vni) {
            vertices.extend_from_slice(&normals[ni]);
        }
        if let (true, Some(ti)) = (has_uvs, vti) {
            vertices.extend_from_slice(&tex_coords[ti]);
        }
    }

    let indices = (0..corners.len() as u32).collect();
    let name = name.unwrap_or_else(|| default_name.to_string());
    let mut mesh = Mesh::new(name, layout, stride, &vertices, indices)?;
    mesh.material = material;

    tracing::debug!(
        "Parsed OBJ '{}': {} positions, {} corners (normals: {}, uvs: {})",
        mesh.name,
        positions.len(),
        corners.len(),
        has_normals,
        has_uvs
    );
    Ok(mesh)
}

fn parse_floats<const N: usize>(parts: &[&str]) -> [f32; N] {
    std::array::from_fn(|i| parts[i].parse().unwrap_or(0.0))
}

/// Resolve a 1-based (or negative, relative) OBJ index against `count` elements
fn resolve_index(s: &str, count: usize) -> Option<usize> {
    let index: i64 = s.parse().ok()?;
    let resolved = match index {
        0 => return None,
        i if i > 0 => i - 1,
        i => count as i64 + i,
    };
    (0..count as i64)
        .contains(&resolved)
        .then_some(resolved as usize)
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_obj_vertex(
    s: &str,
    position_count: usize,
    uv_count: usize,
    normal_count: usize,
) -> Option<Corner> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = resolve_index(parts.first()?, position_count)?;

    let vti = match parts.get(1).filter(|s| !s.is_empty()) {
        Some(s) => Some(resolve_index(s, uv_count)?),
        None => None,
    };

    let vni = match parts.get(2).filter(|s| !s.is_empty()) {
        Some(s) => Some(resolve_index(s, normal_count)?),
        None => None,
    };

    Some((vi, vti, vni))
}
