//! geoprep-export library
//!
//! OBJ import, preparation pipeline and .gpmesh writer around `geoprep-common`, for use by
//! the `geoprep-export` binary and other tools.

pub mod formats;
pub mod manifest;
pub mod mesh;
pub mod pipeline;

// Re-export key types for mesh conversion
pub use formats::{read_prepared_header, write_prepared_mesh, PreparedMeshHeader};
pub use mesh::{convert_obj, convert_obj_to_memory, load_obj, parse_obj};
pub use pipeline::{prepare_mesh, NormalEncoding, PrepSettings, PreparedMesh};
