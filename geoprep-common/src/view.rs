//! Strided views over interleaved vertex data
//!
//! An [`AttributeView`] pairs an f32 vertex array with one channel's
//! `(offset, component_count)` and validates the combination once, up front. After that
//! every per-vertex access is a plain bounds-checked slice.

use glam::Vec3;

use crate::error::{GeomError, GeomResult};
use crate::mesh::AttributeDescriptor;

/// Read-only view of one channel of an interleaved vertex array
#[derive(Debug, Clone, Copy)]
pub struct AttributeView<'a> {
    data: &'a [f32],
    /// Stride in f32 components
    stride: usize,
    /// Offset in f32 components
    offset: usize,
    components: usize,
    count: usize,
}

impl<'a> AttributeView<'a> {
    /// Create a view of `descriptor` over `vertex_count` vertices of `vertex_stride` bytes
    pub fn new(
        data: &'a [f32],
        vertex_stride: u32,
        vertex_count: u32,
        descriptor: AttributeDescriptor,
    ) -> GeomResult<Self> {
        let components = descriptor.component_count as usize;
        if components == 0 || components > 4 {
            return Err(GeomError::UnsupportedComponentCount {
                count: descriptor.component_count,
                expected: "1 to 4",
            });
        }
        if vertex_stride == 0 || vertex_stride % 4 != 0 {
            return Err(GeomError::InvalidLayout(format!(
                "vertex stride {vertex_stride} is not a positive multiple of 4"
            )));
        }
        if descriptor.offset % 4 != 0 {
            return Err(GeomError::InvalidLayout(format!(
                "attribute offset {} is not 4-byte aligned",
                descriptor.offset
            )));
        }

        let stride = vertex_stride as usize / 4;
        let offset = descriptor.offset as usize / 4;
        if offset + components > stride {
            return Err(GeomError::InvalidLayout(format!(
                "attribute at offset {} with {components} components crosses the {vertex_stride}-byte stride",
                descriptor.offset
            )));
        }

        let count = vertex_count as usize;
        let required = count * stride;
        if data.len() < required {
            return Err(GeomError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            stride,
            offset,
            components,
            count,
        })
    }

    /// Number of vertices
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Components per vertex (1..=4)
    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    /// Components of vertex `index`
    ///
    /// # Panics
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn get(&self, index: usize) -> &'a [f32] {
        assert!(index < self.count, "vertex {index} out of {}", self.count);
        let start = index * self.stride + self.offset;
        &self.data[start..start + self.components]
    }

    /// Vertex `index` as a [`Vec3`]; components the channel lacks read as zero
    #[inline]
    pub fn vec3(&self, index: usize) -> Vec3 {
        let c = self.get(index);
        Vec3::new(
            c[0],
            c.get(1).copied().unwrap_or(0.0),
            c.get(2).copied().unwrap_or(0.0),
        )
    }

    /// Iterate over per-vertex component slices
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a [f32]> + '_ {
        (0..self.count).map(move |i| self.get(i))
    }
}
