//! Vertex attribute compression
//!
//! - [`attribute`] quantizes any channel of 1..=4 floats to unorm8 or unorm16, either over
//!   a fixed range or over an automatically measured per-component scale/bias.
//! - [`tangent`] encodes unit normals as two floats, which are then quantized like any
//!   other channel.
//!
//! All outputs are freshly allocated [`AlignedBuffer`](crate::AlignedBuffer)s; inputs are
//! only read.

pub mod attribute;
pub mod tangent;

pub use attribute::{
    compress_vertex_attribute, AttributeCompression, CompressedAttribute, ScaleBias,
};
pub use tangent::{compress_tangent_space, EncodedNormals, TangentFrameCompression, NUDGE_EPSILON};
