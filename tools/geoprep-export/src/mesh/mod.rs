//! Mesh import and conversion (OBJ -> .gpmesh)

mod obj;

pub use obj::{convert_obj, convert_obj_to_memory, load_obj, parse_obj};
