//! Error types for variadic argument lists.

use thiserror::Error;

use crate::abi::{Abi, AbiError};
use crate::memory::MemoryError;

#[derive(Error, Debug)]
pub enum VaListError {
    /// The next argument does not fit in what is left of the buffer.
    #[error("No such element: {layout}")]
    Exhausted { layout: String },

    #[error("No such element: the va_list is empty")]
    Empty,

    #[error("VaList is not supported on {0}")]
    UnsupportedAbi(Abi),

    #[error("Layout {layout} does not carry a {expected} value")]
    CarrierMismatch { expected: &'static str, layout: String },

    #[error("Integer overflow: {0} does not fit in an int")]
    IntOverflow(i64),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
