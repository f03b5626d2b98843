//! x86-64 calling conventions.

pub mod sysv;
pub mod windows;
