//! Error types for layout construction and layout path resolution.

use thiserror::Error;

use crate::memory::MemoryError;

/// Errors raised while building layouts, selecting path elements, or
/// resolving accessor and slice handles.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// A path selector did not apply to the layout it was given. The message
    /// ends with the breadcrumb chain of layouts traversed so far.
    #[error("Bad layout path: {0}")]
    BadLayoutPath(String),

    #[error("Invalid path element: {0}")]
    InvalidPathElement(String),

    #[error("Path does not select a value layout: {0}")]
    NotAValueLayout(String),

    #[error("Invalid alignment constraint: {0}")]
    InvalidAlignment(u64),

    #[error("Invalid alignment constraint for member layout {member} at offset {offset}")]
    MisalignedMember { member: String, offset: u64 },

    #[error("Layout size overflows: {0}")]
    SizeOverflow(String),

    #[error("Index {index} out of bounds for length {bound}")]
    IndexOutOfBounds { index: i64, bound: i64 },

    #[error("Offset computation overflows")]
    OffsetOverflow,

    #[error("Expected {expected} coordinates, got {got}")]
    CoordinateCount { expected: usize, got: usize },

    #[error("Invalid layout descriptor at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
