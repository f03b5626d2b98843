//! Error types for downcall and upcall bridges.

use thiserror::Error;

use crate::abi::AbiError;
use crate::memory::MemoryError;

#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("Expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },

    #[error("Argument {index} expects a {expected} value, got {got}")]
    ArgumentMismatch {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("Return value expects a {expected} value, got {got}")]
    ReturnMismatch { expected: String, got: String },

    #[error("Callback returned no value for non-void return type {0}")]
    MissingReturnValue(String),

    #[error("Storage {0} is not part of the call frame")]
    InvalidStorage(String),

    #[error("Cannot call the null address")]
    NullTarget,

    #[error("No native function at address {0:#x}")]
    UnknownTarget(u64),

    #[error("Upcall stub at {0:#x} belongs to a closed arena")]
    StubClosed(u64),

    #[error("The host platform has no supported ABI")]
    UnsupportedHost,

    #[error("Calling sequence for {got} cannot run on the host ABI {host}")]
    ForeignAbi { host: String, got: String },

    #[error("Native calls need host memory, not a simulated heap")]
    SimulatedMemory,

    #[error("Layout {0} has no native type")]
    NoNativeType(String),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
