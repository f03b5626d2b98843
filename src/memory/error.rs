//! Error types for native memory access.

use thiserror::Error;

/// Errors raised by segment reads, writes and slicing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Already closed: the scope owning this segment is no longer alive")]
    ScopeClosed,

    #[error("Out of bounds access: offset {offset} with length {len} exceeds segment size {size}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("Misaligned access at address {address:#x}, expected alignment {alignment}")]
    Misaligned { address: u64, alignment: u64 },

    #[error("Null address")]
    NullAddress,

    #[error("Unmapped address {address:#x} with length {len}")]
    UnmappedAddress { address: u64, len: u64 },

    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: u64, available: u64 },

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Allocation of {size} bytes exceeds the address space")]
    AllocationOverflow { size: u64 },

    #[error("Invalid allocation of {size} bytes with alignment {align}")]
    InvalidAllocation { size: u64, align: u64 },

    #[error("Out of memory allocating {size} bytes")]
    AllocationFailed { size: u64 },
}
