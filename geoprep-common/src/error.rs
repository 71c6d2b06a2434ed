//! Error types for geometry preparation

use thiserror::Error;

use crate::compress::TangentFrameCompression;
use crate::mesh::VertexSemantic;

/// Result type for geometry preparation operations.
pub type GeomResult<T> = Result<T, GeomError>;

/// Broad failure category of a [`GeomError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required channel, parameter or layout is missing or malformed
    InvalidInput,
    /// Vertex/index counts disagree with the buffers they describe
    InvalidState,
    /// The requested mode is declared but has no implementation
    NotImplemented,
}

/// Errors that can occur while preparing a mesh.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeomError {
    /// A mandatory vertex channel is absent.
    #[error("mesh has no {0:?} channel")]
    MissingAttribute(VertexSemantic),

    /// A channel has a component count the operation cannot handle.
    #[error("unsupported component count {count} (expected {expected})")]
    UnsupportedComponentCount {
        /// Component count found in the descriptor.
        count: u8,
        /// Human readable description of what is accepted.
        expected: &'static str,
    },

    /// Stride or attribute offsets do not describe a valid f32 layout.
    #[error("invalid vertex layout: {0}")]
    InvalidLayout(String),

    /// Welding threshold is negative or not finite.
    #[error("invalid position threshold {0}")]
    InvalidThreshold(f32),

    /// A buffer holds fewer elements than its count claims.
    #[error("buffer too small: need {required} elements, have {actual}")]
    BufferTooSmall {
        /// Elements required by the counts.
        required: usize,
        /// Elements actually present.
        actual: usize,
    },

    /// The index buffer references a vertex that does not exist.
    #[error("index {index} out of range (mesh has {vertex_count} vertices)")]
    IndexOutOfRange {
        /// The offending index value.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: u32,
    },

    /// The tangent frame compression mode has no implementation.
    #[error("tangent frame compression {0:?} is not implemented")]
    NotImplemented(TangentFrameCompression),
}

impl GeomError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingAttribute(_)
            | Self::UnsupportedComponentCount { .. }
            | Self::InvalidLayout(_)
            | Self::InvalidThreshold(_) => ErrorKind::InvalidInput,
            Self::BufferTooSmall { .. } | Self::IndexOutOfRange { .. } => ErrorKind::InvalidState,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GeomError::MissingAttribute(VertexSemantic::Position).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            GeomError::IndexOutOfRange {
                index: 4,
                vertex_count: 3
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            GeomError::NotImplemented(TangentFrameCompression::Quaternion).kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn test_error_messages() {
        let err = GeomError::IndexOutOfRange {
            index: 9,
            vertex_count: 3,
        };
        assert_eq!(err.to_string(), "index 9 out of range (mesh has 3 vertices)");
        assert_eq!(
            GeomError::MissingAttribute(VertexSemantic::Normal).to_string(),
            "mesh has no Normal channel"
        );
    }
}
