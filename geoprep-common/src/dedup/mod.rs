//! Near-duplicate vertex merging
//!
//! Importers emit one vertex per face corner. This module welds vertices whose positions
//! are closer than a threshold (and, optionally, whose normal / uv0 match) into a single
//! averaged vertex and rewrites the index buffer.
//!
//! # Algorithm
//! 1. Bucket every vertex into a [`UniformGrid`] over the inflated bounding box.
//! 2. In every bucket, test each pair of vertices; passing pairs are appended to both
//!    vertices' candidate lists. Every vertex also appends itself once per bucket it
//!    occupies. A pair sharing several buckets is recorded several times; list length
//!    drives the greedy order below, so entries are never deduplicated.
//! 3. Stable-sort the candidate lists by descending length.
//! 4. Walk the lists; each one claims its still-unclaimed members, which are averaged
//!    (every f32 of the vertex) into one new vertex.

mod grid;


use std::ops::{BitOr, BitOrAssign};

use glam::Vec3;
use smallvec::SmallVec;

use crate::bounds::Aabb;
use crate::buffer::AlignedBuffer;
use crate::error::{GeomError, GeomResult};
use crate::math::components_match;
use crate::mesh::{Mesh, VertexSemantic};
use crate::view::AttributeView;

pub use grid::{UniformGrid, AXIS_CELLS, CELL_COUNT};

/// Per-vertex list of merge candidates (the vertex itself included)
type Candidates = SmallVec<[u32; 8]>;

/// Extra channels that must match for two vertices to merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MergeFlags(u8);

impl MergeFlags {
    /// Position only
    pub const NONE: Self = Self(0);
    /// Normals must match within [`EPSILON`](crate::EPSILON)
    pub const NORMAL_EXACT: Self = Self(1 << 1);
    /// First two uv0 components must match within [`EPSILON`](crate::EPSILON)
    pub const UV0_EXACT: Self = Self(1 << 4);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MergeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MergeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Statistics of one merge call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub vertices_before: u32,
    pub vertices_after: u32,
    /// Bucket insertions made while building the grid
    pub grid_insertions: usize,
    /// Passing pair tests (a pair sharing several buckets counts once per bucket)
    pub candidate_pairs: usize,
}

impl MergeStats {
    /// Number of vertices removed by the merge
    #[inline]
    pub fn removed(&self) -> u32 {
        self.vertices_before - self.vertices_after
    }
}

/// Outcome of [`plan_merge`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Compacted interleaved vertices (same stride and layout as the source mesh)
    pub vertices: AlignedBuffer,
    pub vertex_count: u32,
    /// `remap[old] == new` for every original vertex
    pub remap: Vec<u32>,
    pub stats: MergeStats,
}

/// Pair test for two vertices sharing a bucket
struct WeldPredicate<'a> {
    positions: AttributeView<'a>,
    normals: Option<AttributeView<'a>>,
    uvs: Option<AttributeView<'a>>,
    threshold_sq: f32,
}

impl WeldPredicate<'_> {
    fn matches(&self, a: usize, b: usize) -> bool {
        let pos_a: Vec3 = self.positions.vec3(a);
        let pos_b: Vec3 = self.positions.vec3(b);
        if (pos_b - pos_a).length_squared() >= self.threshold_sq {
            return false;
        }
        if let Some(normals) = &self.normals {
            if !components_match(&normals.get(a)[..3], &normals.get(b)[..3]) {
                return false;
            }
        }
        if let Some(uvs) = &self.uvs {
            if !components_match(&uvs.get(a)[..2], &uvs.get(b)[..2]) {
                return false;
            }
        }
        true
    }
}

/// Compute the merged vertex set without touching the mesh
///
/// # Errors
/// - [`GeomError::InvalidThreshold`] for a negative or non-finite threshold
/// - Any error of [`Mesh::validate`] (missing positions, inconsistent counts)
pub fn plan_merge(mesh: &Mesh, threshold: f32, flags: MergeFlags) -> GeomResult<MergeResult> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(GeomError::InvalidThreshold(threshold));
    }
    mesh.validate()?;

    let vertex_count = mesh.vertex_count();
    let positions = mesh.positions()?;
    if vertex_count == 0 {
        return Ok(MergeResult {
            vertices: AlignedBuffer::zeroed(0),
            vertex_count: 0,
            remap: Vec::new(),
            stats: MergeStats::default(),
        });
    }

    // A requested channel the mesh lacks is simply not compared
    let normals = if flags.contains(MergeFlags::NORMAL_EXACT) {
        mesh.optional_view(VertexSemantic::Normal)?
            .filter(|v| v.components() >= 3)
    } else {
        None
    };
    let uvs = if flags.contains(MergeFlags::UV0_EXACT) {
        mesh.optional_view(VertexSemantic::Uv(0))?
            .filter(|v| v.components() >= 2)
    } else {
        None
    };

    let aabb = Aabb::from_positions(&positions);
    let grid = UniformGrid::build(&positions, &aabb);
    let predicate = WeldPredicate {
        positions,
        normals,
        uvs,
        threshold_sq: threshold * threshold,
    };

    let (candidates, candidate_pairs) = collect_candidates(&grid, &predicate, vertex_count as usize);
    let floats_per_vertex = (mesh.vertex_stride() / 4) as usize;
    let (merged, merged_count, remap) =
        greedy_merge(candidates, mesh.vertices(), floats_per_vertex);

    Ok(MergeResult {
        vertices: AlignedBuffer::from_f32s(&merged),
        vertex_count: merged_count,
        remap,
        stats: MergeStats {
            vertices_before: vertex_count,
            vertices_after: merged_count,
            grid_insertions: grid.insertions(),
            candidate_pairs,
        },
    })
}

/// Merge near-duplicate vertices of `mesh` in place
///
/// Vertices closer than `threshold` (strictly) whose flagged channels match are
/// replaced by their average. The vertex buffer is only replaced, and the indices only
/// rewritten, when the vertex count actually shrinks. On error the mesh is untouched.
pub fn merge_duplicated_vertices(
    mesh: &mut Mesh,
    threshold: f32,
    flags: MergeFlags,
) -> GeomResult<MergeStats> {
    let result = plan_merge(mesh, threshold, flags)?;

    if result.vertex_count != mesh.vertex_count() {
        let indices: Vec<u32> = mesh
            .indices()
            .iter()
            .map(|&i| result.remap[i as usize])
            .collect();
        mesh.replace_geometry(result.vertices, result.vertex_count, indices);
    }

    tracing::debug!(
        "Merged mesh '{}': {} -> {} vertices ({} duplicates, {} grid insertions)",
        mesh.name,
        result.stats.vertices_before,
        result.stats.vertices_after,
        result.stats.removed(),
        result.stats.grid_insertions
    );

    Ok(result.stats)
}

/// Test every pair within every bucket, in linear cell order
///
/// Returns the per-vertex candidate lists and the number of passing pair tests.
fn collect_candidates(
    grid: &UniformGrid,
    predicate: &WeldPredicate<'_>,
    vertex_count: usize,
) -> (Vec<Candidates>, usize) {
    let mut candidates: Vec<Candidates> = vec![Candidates::new(); vertex_count];
    let mut pairs = 0;

    for bucket in grid.buckets() {
        for (j, &test) in bucket.iter().enumerate() {
            candidates[test as usize].push(test);

            for &other in &bucket[j + 1..] {
                if predicate.matches(test as usize, other as usize) {
                    candidates[test as usize].push(other);
                    candidates[other as usize].push(test);
                    pairs += 1;
                }
            }
        }
    }

    (candidates, pairs)
}

/// Greedily collapse candidate lists, largest first
///
/// Returns the merged f32 vertices, their count and the total `old -> new` remap.
fn greedy_merge(
    mut candidates: Vec<Candidates>,
    source: &[f32],
    floats_per_vertex: usize,
) -> (Vec<f32>, u32, Vec<u32>) {
    let vertex_count = candidates.len();

    // Stable: equally sized lists keep original vertex order
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut used = vec![false; vertex_count];
    let mut remap = vec![u32::MAX; vertex_count];
    let mut merged: Vec<f32> = Vec::with_capacity(source.len());
    let mut accum = vec![0.0f32; floats_per_vertex];
    let mut merged_count = 0u32;

    for list in &candidates {
        accum.fill(0.0);
        let mut members = 0u32;

        for &vertex in list {
            let vertex = vertex as usize;
            if used[vertex] {
                continue;
            }
            let start = vertex * floats_per_vertex;
            for (sum, value) in accum
                .iter_mut()
                .zip(&source[start..start + floats_per_vertex])
            {
                *sum += value;
            }
            remap[vertex] = merged_count;
            used[vertex] = true;
            members += 1;
        }

        if members > 0 {
            let count = members as f32;
            merged.extend(accum.iter().map(|sum| sum / count));
            merged_count += 1;
        }
    }

    debug_assert!(remap.iter().all(|&r| r < merged_count));
    (merged, merged_count, remap)
}
