//! Tangent frame (normal) encoding
//!
//! Unit normals are packed into two floats in `(0, 1]`, which are later quantized with
//! [`compress_vertex_attribute`]. Only the normal of the tangent frame is handled.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::buffer::AlignedBuffer;
use crate::compress::attribute::{compress_vertex_attribute, AttributeCompression, CompressedAttribute};
use crate::error::{GeomError, GeomResult};
use crate::mesh::{AttributeDescriptor, VertexLayout, VertexSemantic};
use crate::view::AttributeView;

/// Smallest magnitude an encoded component (or an intermediate) may take
pub const NUDGE_EPSILON: f32 = 0.00002;

/// Tangent frame encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentFrameCompression {
    /// Lambert azimuthal equal-area projection of the normal
    AzimuthalProjection,
    /// Sphere-map style projection of the normal
    SphereMapping,
    /// Not implemented
    TangentWithBitangent,
    /// Not implemented
    Quaternion,
}

impl TangentFrameCompression {
    /// Stable numeric id used in file formats
    pub const fn id(self) -> u8 {
        match self {
            Self::AzimuthalProjection => 0,
            Self::SphereMapping => 1,
            Self::TangentWithBitangent => 2,
            Self::Quaternion => 3,
        }
    }

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::AzimuthalProjection),
            1 => Some(Self::SphereMapping),
            2 => Some(Self::TangentWithBitangent),
            3 => Some(Self::Quaternion),
            _ => None,
        }
    }

    /// Whether [`compress_tangent_space`] can produce this encoding
    pub const fn is_implemented(self) -> bool {
        matches!(self, Self::AzimuthalProjection | Self::SphereMapping)
    }

    /// Encode one unit normal, or `None` for unimplemented modes
    pub fn encode(self, normal: Vec3) -> Option<[f32; 2]> {
        match self {
            Self::AzimuthalProjection => Some(encode_azimuthal(normal)),
            Self::SphereMapping => Some(encode_sphere_map(normal)),
            Self::TangentWithBitangent | Self::Quaternion => None,
        }
    }
}

/// Encoded normals, two floats per vertex
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedNormals {
    pub data: AlignedBuffer,
    pub vertex_count: u32,
    pub compression: TangentFrameCompression,
}

impl EncodedNormals {
    /// Per-vertex `[x, y]` pairs
    pub fn as_pairs(&self) -> &[[f32; 2]] {
        bytemuck::cast_slice(self.data.as_f32())
    }

    /// Bytes per encoded vertex
    #[inline]
    pub const fn stride(&self) -> u32 {
        8
    }

    /// Descriptor of the encoded channel within [`Self::data`]
    #[inline]
    pub const fn descriptor(&self) -> AttributeDescriptor {
        AttributeDescriptor::new(0, 2)
    }

    /// Quantize the encoded pairs
    pub fn compress(&self, compression: AttributeCompression) -> GeomResult<CompressedAttribute> {
        compress_vertex_attribute(
            self.data.as_f32(),
            self.stride(),
            self.vertex_count,
            self.descriptor(),
            compression,
        )
    }
}

/// Replace an exact zero with `±NUDGE_EPSILON`, keeping its sign
#[inline]
fn nudge(value: f32) -> f32 {
    if value == 0.0 {
        NUDGE_EPSILON.copysign(value)
    } else {
        value
    }
}

fn encode_azimuthal(n: Vec3) -> [f32; 2] {
    let scaler = (8.0 * n.z + 8.0).sqrt();
    // NaN from a (0, 0, -1) normal clamps to the lower bound
    let x = (n.x / scaler + 0.5).max(NUDGE_EPSILON).min(1.0);
    let y = (n.y / scaler + 0.5).max(NUDGE_EPSILON).min(1.0);
    [x, y]
}

fn encode_sphere_map(n: Vec3) -> [f32; 2] {
    let nx = nudge(n.x);
    let ny = nudge(n.y);
    let len_xy = Vec3::new(nx, ny, 0.0).length();
    let z = nudge(n.z * 0.5 + 0.5).sqrt();

    let x = nx * z / len_xy;
    let y = ny * z / len_xy;
    [(x * 0.5 + 0.5).min(1.0), (y * 0.5 + 0.5).min(1.0)]
}

/// Encode the normal channel of an interleaved f32 vertex array
///
/// # Errors
/// - `NotImplemented` for [`TangentFrameCompression::TangentWithBitangent`] and
///   [`TangentFrameCompression::Quaternion`]
/// - `MissingAttribute` when the layout has no normal channel
/// - `UnsupportedComponentCount` unless the normal has exactly 3 components
pub fn compress_tangent_space(
    data: &[f32],
    vertex_stride: u32,
    vertex_count: u32,
    layout: &VertexLayout,
    compression: TangentFrameCompression,
) -> GeomResult<EncodedNormals> {
    if !compression.is_implemented() {
        return Err(GeomError::NotImplemented(compression));
    }

    let descriptor = layout.get(VertexSemantic::Normal);
    if !descriptor.is_present() {
        return Err(GeomError::MissingAttribute(VertexSemantic::Normal));
    }
    if descriptor.component_count != 3 {
        return Err(GeomError::UnsupportedComponentCount {
            count: descriptor.component_count,
            expected: "exactly 3 normal components",
        });
    }

    let normals = AttributeView::new(data, vertex_stride, vertex_count, descriptor)?;
    let encoded: Vec<[f32; 2]> = (0..normals.len())
        .filter_map(|i| compression.encode(normals.vec3(i)))
        .collect();

    Ok(EncodedNormals {
        data: AlignedBuffer::from_f32s(bytemuck::cast_slice(&encoded)),
        vertex_count,
        compression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn encode_all(normals: &[[f32; 3]], mode: TangentFrameCompression) -> EncodedNormals {
        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Normal, 3)]);
        let flat: Vec<f32> = normals.iter().flatten().copied().collect();
        compress_tangent_space(&flat, stride, normals.len() as u32, &layout, mode).unwrap()
    }

    #[test]
    fn test_azimuthal_up_vector_is_centered() {
        let encoded = encode_all(&[[0.0, 0.0, 1.0]], TangentFrameCompression::AzimuthalProjection);
        assert_eq!(encoded.as_pairs(), &[[0.5, 0.5]]);
    }

    #[test]
    fn test_azimuthal_side_vectors() {
        let encoded = encode_all(
            &[[1.0, 0.0, 0.0], [0.0, -1.0, 0.0]],
            TangentFrameCompression::AzimuthalProjection,
        );
        let scaler = 8.0f32.sqrt();
        let pairs = encoded.as_pairs();
        assert_eq!(pairs[0], [1.0 / scaler + 0.5, 0.5]);
        assert_eq!(pairs[1], [0.5, 0.5 - 1.0 / scaler]);
    }

    #[test]
    fn test_azimuthal_down_vector_clamps() {
        let encoded = encode_all(&[[0.0, 0.0, -1.0]], TangentFrameCompression::AzimuthalProjection);
        assert_eq!(encoded.as_pairs(), &[[NUDGE_EPSILON, NUDGE_EPSILON]]);
    }

    #[test]
    fn test_outputs_stay_in_unit_range() {
        let normals: Vec<[f32; 3]> = (0..64)
            .map(|i| {
                let theta = i as f32 * 0.37;
                let phi = i as f32 * 0.11 - 3.0;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                n.normalize().to_array()
            })
            .collect();
        for mode in [
            TangentFrameCompression::AzimuthalProjection,
            TangentFrameCompression::SphereMapping,
        ] {
            for &[x, y] in encode_all(&normals, mode).as_pairs() {
                assert!(x > 0.0 && x <= 1.0, "{mode:?}: x = {x}");
                assert!(y > 0.0 && y <= 1.0, "{mode:?}: y = {y}");
            }
        }
    }

    #[test]
    fn test_sphere_map_nudges_zero_components() {
        // nx = ny = 0 becomes (ε, ε): the pair points diagonally at full length
        let encoded = encode_all(&[[0.0, 0.0, 1.0]], TangentFrameCompression::SphereMapping);
        let expected = std::f32::consts::FRAC_1_SQRT_2 * 0.5 + 0.5;
        let [x, y] = encoded.as_pairs()[0];
        assert!((x - expected).abs() < 1e-6);
        assert!((y - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sphere_map_keeps_sign() {
        let encoded = encode_all(&[[-1.0, 0.0, 0.0]], TangentFrameCompression::SphereMapping);
        let [x, y] = encoded.as_pairs()[0];
        assert!(x < 0.5);
        assert!((y - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_nudge() {
        assert_eq!(nudge(0.0), NUDGE_EPSILON);
        assert_eq!(nudge(-0.0), -NUDGE_EPSILON);
        assert_eq!(nudge(0.25), 0.25);
    }

    #[test]
    fn test_unimplemented_modes() {
        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Normal, 3)]);
        for mode in [
            TangentFrameCompression::TangentWithBitangent,
            TangentFrameCompression::Quaternion,
        ] {
            let err = compress_tangent_space(&[0.0, 0.0, 1.0], stride, 1, &layout, mode).unwrap_err();
            assert_eq!(err, GeomError::NotImplemented(mode));
            assert_eq!(err.kind(), ErrorKind::NotImplemented);
        }
    }

    #[test]
    fn test_requires_three_component_normal() {
        let (layout, stride) = VertexLayout::interleaved(&[
            (VertexSemantic::Position, 3),
            (VertexSemantic::Normal, 4),
        ]);
        let err = compress_tangent_space(
            &[0.0; 7],
            stride,
            1,
            &layout,
            TangentFrameCompression::AzimuthalProjection,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let (layout, stride) = VertexLayout::interleaved(&[(VertexSemantic::Position, 3)]);
        let err = compress_tangent_space(
            &[0.0; 3],
            stride,
            1,
            &layout,
            TangentFrameCompression::SphereMapping,
        )
        .unwrap_err();
        assert_eq!(err, GeomError::MissingAttribute(VertexSemantic::Normal));
    }

    #[test]
    fn test_encoded_pairs_feed_the_quantizer() {
        let encoded = encode_all(
            &[[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            TangentFrameCompression::AzimuthalProjection,
        );
        let quantized = encoded.compress(AttributeCompression::UFloatNormToU8Norm).unwrap();
        assert_eq!(quantized.component_count, 2);
        let values = quantized.as_u8().unwrap();
        assert_eq!(&values[..2], &[128, 128]);
        assert!(values[2] > 128);
    }

    #[test]
    fn test_mode_ids() {
        for id in 0..4 {
            let mode = TangentFrameCompression::from_id(id).unwrap();
            assert_eq!(mode.id(), id);
        }
        assert_eq!(TangentFrameCompression::from_id(4), None);
    }
}
