//! Convenient re-exports for common usage patterns.
//!
//! # Example
//!
//! ```ignore
//! use foreign_linker::prelude::*;
//!
//! let arena = Arena::new();
//! let list = VaList::builder(Abi::WindowsX64, &arena)?
//!     .add_int(&ValueLayout::INT, 42)?
//!     .build()?;
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Layouts
pub use crate::layout::{
    ByteOrder, Carrier, GroupLayout, LayoutPath, MemoryLayout, PathElement, SequenceLayout,
    ValueLayout,
};

// Memory
pub use crate::memory::{Arena, MemorySegment, NativeMemory, Scope, Value};

// Call arrangement
pub use crate::abi::{Abi, Arch, CallingSequence, FunctionDescriptor, LinkerOptions, Os, Platform};

// Linking
pub use crate::linker::{DowncallHandle, HostInvoker, Linker, NativeInvoker, UpcallStub};

// Variadic arguments
pub use crate::valist::{VaList, VaListBuilder};

// Symbol lookup
pub use crate::lookup::{LibraryLookup, SymbolLookup, SystemLookup};

// Configuration
pub use crate::config::Config;
