//! Foreign-function linking for native calling conventions.
//!
//! This library describes native memory with layouts, arranges function
//! signatures onto the registers and stack of a target ABI, marshals
//! downcalls and upcalls through those arrangements (calling real native
//! code through libffi on the host), builds and reads C
//! `va_list` buffers, and finds native symbols in the platform's C library.
//!
//! # Quick Start
//!
//! ```ignore
//! use foreign_linker::prelude::*;
//!
//! let linker = Linker::new(Platform::new(Arch::X64, Os::Linux))?;
//! let descriptor: FunctionDescriptor = "(i4[d8d8])v".parse()?;
//! let sequence = linker.calling_sequence(&descriptor, &LinkerOptions::default())?;
//! println!("{}", sequence);
//! ```
//!
//! # Modules
//!
//! - [`layout`] - Memory layouts, layout paths and accessor handles
//! - [`memory`] - Native memory, segments, scopes and arenas
//! - [`abi`] - Per-ABI classification and call arrangement
//! - [`linker`] - Downcall handles, upcall stubs and the linker context
//! - [`valist`] - `va_list` construction and traversal
//! - [`lookup`] - Library and system symbol lookup
//! - [`config`] - TOML configuration
//!
//! # Feature Flags
//!
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the `foreign-linker` developer binary
//! - `full` - Enable all features

pub mod abi;
pub mod config;
pub mod layout;
pub mod linker;
mod logging;
pub mod lookup;
pub mod memory;
pub mod prelude;
pub mod valist;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export the types most callers start from
pub use abi::{Abi, FunctionDescriptor, LinkerOptions, Platform};
pub use layout::{MemoryLayout, ValueLayout};
pub use linker::Linker;
pub use memory::{Arena, MemorySegment, Value};
