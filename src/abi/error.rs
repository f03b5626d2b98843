//! Error types for classification and call arrangement.

use thiserror::Error;

use crate::layout::LayoutError;

use super::{Arch, Os};

/// Errors that abort arranging a call. Nothing is partially arranged when
/// one of these is returned.
#[derive(Error, Debug)]
pub enum AbiError {
    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("Unsupported platform: {arch} {os}")]
    UnsupportedPlatform { arch: Arch, os: Os },

    #[error("Unknown ABI name: {0}")]
    UnknownAbi(String),

    #[error("Variadic argument {index} has layout {layout}, which is not a promoted type")]
    InvalidVariadicLayout { index: usize, layout: String },

    #[error("First variadic argument index {index} is out of range for {count} arguments")]
    InvalidVariadicIndex { index: usize, count: usize },

    #[error("Invalid function descriptor: {0}")]
    InvalidDescriptor(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}
