//! Uniform 32×32×32 grid over the mesh bounding box
//!
//! Each vertex is bucketed into its home cell plus, per axis, the next cell up when the
//! vertex sits in the upper half of its home cell. Two vertices closer than a cell width
//! that straddle a cell boundary therefore always share at least one bucket.

use glam::Vec3;

use crate::bounds::Aabb;
use crate::view::AttributeView;

/// Cells along each axis
pub const AXIS_CELLS: usize = 32;
/// Total number of cells
pub const CELL_COUNT: usize = AXIS_CELLS * AXIS_CELLS * AXIS_CELLS;

/// Growth applied to the box size before partitioning
const SIZE_INFLATION: f32 = 1.01;
/// Smallest box size per axis (keeps flat meshes from producing zero-width cells)
const MIN_AXIS_SIZE: f32 = 1.0;

/// Neighbor axis subsets in insertion order: X, Y, Z, XY, XZ, YZ, XYZ
const NEIGHBOR_MASKS: [u8; 7] = [0b001, 0b010, 0b100, 0b011, 0b101, 0b110, 0b111];

/// Vertex indices bucketed by grid cell
pub struct UniformGrid {
    origin: Vec3,
    inv_cell_size: Vec3,
    buckets: Vec<Vec<u32>>,
    memberships: Vec<u8>,
}

impl UniformGrid {
    /// Partition `positions` over the (inflated) box `aabb`
    pub fn build(positions: &AttributeView<'_>, aabb: &Aabb) -> Self {
        let size = (aabb.size() * SIZE_INFLATION).max(Vec3::splat(MIN_AXIS_SIZE));
        let mut grid = Self {
            origin: aabb.min,
            inv_cell_size: Vec3::splat(AXIS_CELLS as f32) / size,
            buckets: vec![Vec::new(); CELL_COUNT],
            memberships: vec![0; positions.len()],
        };

        for vertex in 0..positions.len() {
            grid.insert(vertex as u32, positions.vec3(vertex));
        }
        grid
    }

    fn insert(&mut self, vertex: u32, position: Vec3) {
        let delta = (position - self.origin) * self.inv_cell_size;
        let home_f = delta.floor().to_array();
        let rounded = (delta + Vec3::splat(0.5)).floor().to_array();

        let mut home = [0i32; 3];
        let mut neighbor = [None; 3];
        for axis in 0..3 {
            home[axis] = (home_f[axis] as i32).clamp(0, AXIS_CELLS as i32 - 1);
            let n = rounded[axis] as i32;
            if n != home[axis] && (0..AXIS_CELLS as i32).contains(&n) {
                neighbor[axis] = Some(n);
            }
        }

        self.push(vertex, home);
        for mask in NEIGHBOR_MASKS {
            let mut coords = home;
            let mut valid = true;
            for axis in 0..3 {
                if mask & (1 << axis) != 0 {
                    match neighbor[axis] {
                        Some(n) => coords[axis] = n,
                        None => valid = false,
                    }
                }
            }
            if valid {
                self.push(vertex, coords);
            }
        }
    }

    fn push(&mut self, vertex: u32, [x, y, z]: [i32; 3]) {
        let cell = Self::cell_index(x as usize, y as usize, z as usize);
        self.buckets[cell].push(vertex);
        self.memberships[vertex as usize] += 1;
    }

    /// Linear index of cell `(x, y, z)`
    #[inline]
    pub const fn cell_index(x: usize, y: usize, z: usize) -> usize {
        x + y * AXIS_CELLS + z * AXIS_CELLS * AXIS_CELLS
    }

    /// Vertices bucketed in `cell`
    #[inline]
    pub fn cell(&self, cell: usize) -> &[u32] {
        &self.buckets[cell]
    }

    /// All buckets in linear cell order
    pub fn buckets(&self) -> impl Iterator<Item = &[u32]> {
        self.buckets.iter().map(Vec::as_slice)
    }

    /// Linear indices of every cell that holds `vertex`
    pub fn cells_of(&self, vertex: u32) -> Vec<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| bucket.contains(&vertex))
            .map(|(cell, _)| cell)
            .collect()
    }

    /// Number of cells each vertex was inserted into (1..=8)
    #[inline]
    pub fn memberships(&self) -> &[u8] {
        &self.memberships
    }

    /// Total bucket insertions over all vertices
    pub fn insertions(&self) -> usize {
        self.memberships.iter().map(|&m| m as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::AttributeDescriptor;

    fn grid_for(points: &[[f32; 3]]) -> UniformGrid {
        let flat: Vec<f32> = points.iter().flatten().copied().collect();
        let view =
            AttributeView::new(&flat, 12, points.len() as u32, AttributeDescriptor::new(0, 3))
                .unwrap();
        UniformGrid::build(&view, &Aabb::from_positions(&view))
    }

    #[test]
    fn test_cell_index() {
        assert_eq!(UniformGrid::cell_index(0, 0, 0), 0);
        assert_eq!(UniformGrid::cell_index(31, 31, 31), CELL_COUNT - 1);
        assert_eq!(UniformGrid::cell_index(1, 2, 3), 1 + 64 + 3072);
    }

    // Anchors span the box [0, 32]^3; inflated by 1% that makes cells ~1.01 wide
    const ANCHORS: [[f32; 3]; 2] = [[0.0, 0.0, 0.0], [32.0, 32.0, 32.0]];

    fn grid_with_anchors(point: [f32; 3]) -> UniformGrid {
        grid_for(&[ANCHORS[0], ANCHORS[1], point])
    }

    #[test]
    fn test_lower_half_stays_home() {
        let grid = grid_with_anchors([0.1, 0.1, 0.1]);
        assert_eq!(grid.memberships()[2], 1);
        assert_eq!(grid.cells_of(2), vec![0]);
    }

    #[test]
    fn test_upper_half_spills_into_all_neighbors() {
        let grid = grid_with_anchors([0.9, 0.9, 0.9]);
        assert_eq!(grid.memberships()[2], 8);
        let mut cells = grid.cells_of(2);
        cells.sort_unstable();
        let mut expected: Vec<usize> = (0..8)
            .map(|m| UniformGrid::cell_index(m & 1, (m >> 1) & 1, (m >> 2) & 1))
            .collect();
        expected.sort_unstable();
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_single_axis_neighbor() {
        let grid = grid_with_anchors([0.9, 0.1, 0.1]);
        assert_eq!(grid.cells_of(2), vec![0, 1]);
    }

    #[test]
    fn test_neighbors_outside_grid_skipped() {
        // The max corner sits in the last cell's upper half; +1 would leave the grid
        let grid = grid_for(&ANCHORS);
        assert_eq!(grid.memberships(), &[1, 1]);
        assert_eq!(grid.cell(CELL_COUNT - 1), &[1]);
    }

    #[test]
    fn test_degenerate_box_uses_unit_size() {
        // All vertices coincide: the box is clamped to size 1 and every vertex lands in cell 0
        let grid = grid_for(&[[5.0, 5.0, 5.0]; 4]);
        assert_eq!(grid.cell(0), &[0, 1, 2, 3]);
        assert_eq!(grid.insertions(), 4);
    }

    #[test]
    fn test_insertion_order_within_bucket() {
        let grid = grid_for(&[[0.2, 0.2, 0.2], [32.0, 32.0, 32.0], [0.3, 0.3, 0.3]]);
        assert_eq!(grid.cell(0), &[0, 2]);
    }
}
