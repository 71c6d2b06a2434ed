//! Offline geometry preparation for unprocessed triangle meshes
//!
//! This crate turns the intermediate mesh an importer produces (interleaved f32 vertex
//! attributes + u32 index list) into data that is ready for GPU upload:
//!
//! - [`bounds`] - Axis-aligned box and approximate bounding sphere
//! - [`dedup`] - Uniform-grid welding of near-duplicate vertices
//! - [`compress`] - Attribute quantization (unorm8/unorm16) and normal encoding
//!
//! Supporting modules:
//!
//! - [`mesh`] - Vertex semantics, attribute descriptors and the [`Mesh`] container
//! - [`view`] - Bounds-checked strided views over interleaved vertex data
//! - [`buffer`] - 16-byte aligned byte buffers
//! - [`math`] - Epsilon-tolerant helpers on top of `glam`
//!
//! Every operation is synchronous and only touches the mesh it is given, so independent
//! meshes can be processed on different threads.

pub mod bounds;
pub mod buffer;
pub mod compress;
pub mod dedup;
pub mod error;
pub mod math;
pub mod mesh;
pub mod view;

pub use bounds::{compute_aabb, compute_bounding_sphere, merge_spheres, Aabb, BoundingSphere};
pub use buffer::AlignedBuffer;
pub use compress::{
    compress_tangent_space, compress_vertex_attribute, AttributeCompression, CompressedAttribute,
    EncodedNormals, ScaleBias, TangentFrameCompression,
};
pub use dedup::{merge_duplicated_vertices, plan_merge, MergeFlags, MergeResult, MergeStats};
pub use error::{ErrorKind, GeomError, GeomResult};
pub use math::{Vec3Ext, EPSILON};
pub use mesh::{AttributeDescriptor, Mesh, VertexLayout, VertexSemantic};
pub use view::AttributeView;
