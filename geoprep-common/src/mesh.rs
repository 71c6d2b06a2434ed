//! Unprocessed triangle mesh
//!
//! Importers emit meshes as indexed triangle lists with a single interleaved vertex
//! array. Every vertex component is an f32; indices are u32.
//!
//! # Layout
//! ```text
//! vertex i: [ position | normal? | uv0? | ... ]   (vertex_stride bytes)
//!             ^ offset of each channel comes from the VertexLayout table
//! ```

use xxhash_rust::xxh3::xxh3_64;

use crate::buffer::AlignedBuffer;
use crate::compress::{
    compress_tangent_space, compress_vertex_attribute, AttributeCompression, CompressedAttribute,
    EncodedNormals, TangentFrameCompression,
};
use crate::error::{GeomError, GeomResult};
use crate::view::AttributeView;

/// Maximum number of texture coordinate sets
pub const MAX_UV_SETS: u8 = 8;

/// Semantic meaning of a vertex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Binormal,
    Color,
    BlendIndex,
    BlendWeight,
    /// Texture coordinate set 0..8
    Uv(u8),
}

impl VertexSemantic {
    /// Number of entries in a [`VertexLayout`]
    pub const COUNT: usize = 7 + MAX_UV_SETS as usize;

    /// Slot of this semantic in the descriptor table
    ///
    /// Returns `None` for a uv set outside `0..8`.
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Position => Some(0),
            Self::Normal => Some(1),
            Self::Tangent => Some(2),
            Self::Binormal => Some(3),
            Self::Color => Some(4),
            Self::BlendIndex => Some(5),
            Self::BlendWeight => Some(6),
            Self::Uv(set) if set < MAX_UV_SETS => Some(7 + set as usize),
            Self::Uv(_) => None,
        }
    }

    /// Inverse of [`VertexSemantic::index`]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Position),
            1 => Some(Self::Normal),
            2 => Some(Self::Tangent),
            3 => Some(Self::Binormal),
            4 => Some(Self::Color),
            5 => Some(Self::BlendIndex),
            6 => Some(Self::BlendWeight),
            7..=14 => Some(Self::Uv((index - 7) as u8)),
            _ => None,
        }
    }
}

/// Location of one channel inside an interleaved vertex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Byte offset from the start of the vertex
    pub offset: u16,
    /// Number of f32 components (0 = channel absent)
    pub component_count: u8,
}

impl AttributeDescriptor {
    /// Descriptor of a channel that is not present
    pub const ABSENT: Self = Self {
        offset: 0,
        component_count: 0,
    };

    pub const fn new(offset: u16, component_count: u8) -> Self {
        Self {
            offset,
            component_count,
        }
    }

    #[inline]
    pub const fn is_present(&self) -> bool {
        self.component_count != 0
    }

    /// Size of the channel in bytes
    #[inline]
    pub const fn byte_size(&self) -> usize {
        self.component_count as usize * 4
    }
}

/// Descriptor table: one [`AttributeDescriptor`] per [`VertexSemantic`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: [AttributeDescriptor; VertexSemantic::COUNT],
}

impl VertexLayout {
    /// Build a tightly packed layout from `(semantic, components)` pairs, in order
    ///
    /// Returns the layout and its stride in bytes.
    pub fn interleaved(channels: &[(VertexSemantic, u8)]) -> (Self, u32) {
        let mut layout = Self::default();
        let mut offset = 0u16;
        for &(semantic, components) in channels {
            layout.set(semantic, AttributeDescriptor::new(offset, components));
            offset += components as u16 * 4;
        }
        (layout, offset as u32)
    }

    /// Descriptor for `semantic` ([`AttributeDescriptor::ABSENT`] if not present)
    #[inline]
    pub fn get(&self, semantic: VertexSemantic) -> AttributeDescriptor {
        semantic
            .index()
            .map(|i| self.attributes[i])
            .unwrap_or(AttributeDescriptor::ABSENT)
    }

    /// Set the descriptor for `semantic` (uv sets outside `0..8` are ignored)
    pub fn set(&mut self, semantic: VertexSemantic, descriptor: AttributeDescriptor) {
        if let Some(i) = semantic.index() {
            self.attributes[i] = descriptor;
        }
    }

    /// Builder form of [`VertexLayout::set`]
    pub fn with(mut self, semantic: VertexSemantic, descriptor: AttributeDescriptor) -> Self {
        self.set(semantic, descriptor);
        self
    }

    #[inline]
    pub fn has(&self, semantic: VertexSemantic) -> bool {
        self.get(semantic).is_present()
    }

    /// Present channels in table order
    pub fn present(&self) -> impl Iterator<Item = (VertexSemantic, AttributeDescriptor)> + '_ {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_present())
            .filter_map(|(i, d)| VertexSemantic::from_index(i).map(|s| (s, *d)))
    }

    /// Check every present channel against `vertex_stride`
    pub fn validate(&self, vertex_stride: u32) -> GeomResult<()> {
        if vertex_stride == 0 || vertex_stride % 4 != 0 {
            return Err(GeomError::InvalidLayout(format!(
                "vertex stride {vertex_stride} is not a positive multiple of 4"
            )));
        }
        for (semantic, desc) in self.present() {
            if desc.component_count > 4 {
                return Err(GeomError::UnsupportedComponentCount {
                    count: desc.component_count,
                    expected: "1 to 4",
                });
            }
            if desc.offset % 4 != 0 {
                return Err(GeomError::InvalidLayout(format!(
                    "{semantic:?} offset {} is not 4-byte aligned",
                    desc.offset
                )));
            }
            if desc.offset as usize + desc.byte_size() > vertex_stride as usize {
                return Err(GeomError::InvalidLayout(format!(
                    "{semantic:?} channel ends past the vertex stride {vertex_stride}"
                )));
            }
        }
        Ok(())
    }
}

/// Indexed triangle mesh with interleaved f32 vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Debug name
    pub name: String,
    /// Material reference, as named by the importer
    pub material: Option<String>,
    layout: VertexLayout,
    vertex_stride: u32,
    vertex_count: u32,
    vertices: AlignedBuffer,
    indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from interleaved f32 vertex data
    ///
    /// `vertices` must hold exactly `vertex_stride / 4` floats per vertex.
    pub fn new(
        name: impl Into<String>,
        layout: VertexLayout,
        vertex_stride: u32,
        vertices: &[f32],
        indices: Vec<u32>,
    ) -> GeomResult<Self> {
        layout.validate(vertex_stride)?;
        let floats_per_vertex = (vertex_stride / 4) as usize;
        if vertices.len() % floats_per_vertex != 0 {
            return Err(GeomError::InvalidLayout(format!(
                "{} floats is not a whole number of {floats_per_vertex}-float vertices",
                vertices.len()
            )));
        }

        let mesh = Self {
            name: name.into(),
            material: None,
            layout,
            vertex_stride,
            vertex_count: (vertices.len() / floats_per_vertex) as u32,
            vertices: AlignedBuffer::from_f32s(vertices),
            indices,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Builder form for the material reference
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Bytes per vertex
    #[inline]
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Interleaved vertex data as f32 components
    #[inline]
    pub fn vertices(&self) -> &[f32] {
        self.vertices.as_f32()
    }

    /// Interleaved vertex data with its 16-byte aligned backing storage
    #[inline]
    pub fn vertex_buffer(&self) -> &AlignedBuffer {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// 64-bit hash of the debug name
    pub fn name_hash(&self) -> u64 {
        xxh3_64(self.name.as_bytes())
    }

    /// Strided view of one channel
    pub fn view(&self, semantic: VertexSemantic) -> GeomResult<AttributeView<'_>> {
        let descriptor = self.layout.get(semantic);
        if !descriptor.is_present() {
            return Err(GeomError::MissingAttribute(semantic));
        }
        AttributeView::new(
            self.vertices(),
            self.vertex_stride,
            self.vertex_count,
            descriptor,
        )
    }

    /// View of a channel, or `None` when the layout does not contain it
    pub fn optional_view(&self, semantic: VertexSemantic) -> GeomResult<Option<AttributeView<'_>>> {
        if self.layout.has(semantic) {
            self.view(semantic).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Position view; the position channel must have at least 3 components
    pub fn positions(&self) -> GeomResult<AttributeView<'_>> {
        let view = self.view(VertexSemantic::Position)?;
        if view.components() < 3 {
            return Err(GeomError::UnsupportedComponentCount {
                count: view.components() as u8,
                expected: "3 or 4 position components",
            });
        }
        Ok(view)
    }

    /// Check the mesh for internal consistency
    ///
    /// Missing positions and malformed layouts are input errors; buffers that disagree
    /// with the counts and out-of-range indices are state errors.
    pub fn validate(&self) -> GeomResult<()> {
        self.layout.validate(self.vertex_stride)?;
        self.positions()?;

        let required = self.vertex_count as usize * self.vertex_stride as usize;
        if self.vertices.len() < required {
            return Err(GeomError::BufferTooSmall {
                required,
                actual: self.vertices.len(),
            });
        }

        if let Some(&index) = self.indices.iter().find(|&&i| i >= self.vertex_count) {
            return Err(GeomError::IndexOutOfRange {
                index,
                vertex_count: self.vertex_count,
            });
        }
        Ok(())
    }

    /// Quantize one channel (see [`compress_vertex_attribute`])
    pub fn compress_attribute(
        &self,
        semantic: VertexSemantic,
        compression: AttributeCompression,
    ) -> GeomResult<CompressedAttribute> {
        let descriptor = self.layout.get(semantic);
        if !descriptor.is_present() {
            return Err(GeomError::MissingAttribute(semantic));
        }
        compress_vertex_attribute(
            self.vertices(),
            self.vertex_stride,
            self.vertex_count,
            descriptor,
            compression,
        )
    }

    /// Encode the normal channel (see [`compress_tangent_space`])
    pub fn compress_tangent_space(
        &self,
        compression: TangentFrameCompression,
    ) -> GeomResult<EncodedNormals> {
        compress_tangent_space(
            self.vertices(),
            self.vertex_stride,
            self.vertex_count,
            &self.layout,
            compression,
        )
    }

    /// Swap in a fully built vertex set and index buffer
    ///
    /// Callers build the replacement completely before calling this, so the mesh never
    /// holds a half-updated state.
    pub(crate) fn replace_geometry(
        &mut self,
        vertices: AlignedBuffer,
        vertex_count: u32,
        indices: Vec<u32>,
    ) {
        debug_assert_eq!(
            vertices.len(),
            vertex_count as usize * self.vertex_stride as usize
        );
        self.vertices = vertices;
        self.vertex_count = vertex_count;
        self.indices = indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let (layout, stride) = VertexLayout::interleaved(&[
            (VertexSemantic::Position, 3),
            (VertexSemantic::Normal, 3),
            (VertexSemantic::Uv(0), 2),
        ]);
        #[rustfmt::skip]
        let vertices = [
            0.0, 0.0, 0.0,  0.0, 0.0, 1.0,  0.0, 0.0,
            1.0, 0.0, 0.0,  0.0, 0.0, 1.0,  1.0, 0.0,
            0.0, 1.0, 0.0,  0.0, 0.0, 1.0,  0.0, 1.0,
        ];
        Mesh::new("triangle", layout, stride, &vertices, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn test_semantic_index_roundtrip() {
        for i in 0..VertexSemantic::COUNT {
            let semantic = VertexSemantic::from_index(i).unwrap();
            assert_eq!(semantic.index(), Some(i));
        }
        assert_eq!(VertexSemantic::Uv(8).index(), None);
        assert_eq!(VertexSemantic::from_index(VertexSemantic::COUNT), None);
    }

    #[test]
    fn test_interleaved_layout() {
        let (layout, stride) = VertexLayout::interleaved(&[
            (VertexSemantic::Position, 3),
            (VertexSemantic::Normal, 3),
            (VertexSemantic::Uv(0), 2),
        ]);
        assert_eq!(stride, 32);
        assert_eq!(layout.get(VertexSemantic::Normal), AttributeDescriptor::new(12, 3));
        assert_eq!(layout.get(VertexSemantic::Uv(0)), AttributeDescriptor::new(24, 2));
        assert!(!layout.has(VertexSemantic::Color));
        assert_eq!(layout.present().count(), 3);
    }

    #[test]
    fn test_mesh_counts() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.vertex_stride(), 32);
        assert_eq!(mesh.positions().unwrap().vec3(1), glam::Vec3::X);
        assert_eq!(mesh.name_hash(), xxh3_64(b"triangle"));
    }

    #[test]
    fn test_missing_position_rejected() {
        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Normal, 3)]);
        let err = Mesh::new("bad", layout, stride, &[0.0, 0.0, 1.0], vec![]).unwrap_err();
        assert_eq!(err, GeomError::MissingAttribute(VertexSemantic::Position));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Position, 3)]);
        let err = Mesh::new("bad", layout, stride, &[0.0; 6], vec![0, 1, 2]).unwrap_err();
        assert_eq!(
            err,
            GeomError::IndexOutOfRange {
                index: 2,
                vertex_count: 2
            }
        );
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
    }

    #[test]
    fn test_partial_vertex_rejected() {
        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Position, 3)]);
        assert!(matches!(
            Mesh::new("bad", layout, stride, &[0.0; 4], vec![]),
            Err(GeomError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_channel_past_stride_rejected() {
        let layout = VertexLayout::default()
            .with(VertexSemantic::Position, AttributeDescriptor::new(0, 3))
            .with(VertexSemantic::Normal, AttributeDescriptor::new(8, 3));
        assert!(matches!(
            layout.validate(12),
            Err(GeomError::InvalidLayout(_))
        ));
    }
}
