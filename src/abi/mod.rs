//! Per-ABI type classification and call arrangement.
//!
//! The set of supported ABIs is closed: [`Abi`] is an enum, and each variant
//! dispatches to the classifier and arranger in its own sub-module.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for arrangement
//! - `platform`: architecture/OS identification
//! - `descriptor`: [`FunctionDescriptor`] and [`LinkerOptions`]
//! - `binding`: the binding plan types ([`CallingSequence`] and friends)
//! - [`x64`]: SysV and Windows x86-64
//! - [`aarch64`]: Linux AArch64 (AAPCS64)
//! - [`ppc64`]: PPC64LE SysV (ELFv2) and AIX PPC64
//! - [`s390x`]: Linux on IBM Z

pub mod aarch64;
mod binding;
mod descriptor;
pub mod error;
mod platform;
pub mod ppc64;
pub mod s390x;
pub mod x64;

pub use binding::{
    Accessor, ArgumentBinding, CallingSequence, ChunkKind, RegisterFile, ReturnBinding,
    STACK_SLOT_SIZE, Storage, StructChunk,
};
pub(crate) use binding::{
    StorageAllocator, check_signature, homogeneous_float_members, natural_accessor, raw_chunks,
    stack_chunk,
};
pub use descriptor::{FunctionDescriptor, LinkerOptions};
pub use error::AbiError;
pub use platform::{Arch, Os, Platform};

use std::fmt;
use std::str::FromStr;

use crate::layout::{ByteOrder, MemoryLayout, ValueLayout};
#[cfg(feature = "logging")]
use crate::logging::trace;

/// A supported calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    SysVX64,
    WindowsX64,
    LinuxAArch64,
    SysVPpc64le,
    AixPpc64,
    SysVS390x,
}

impl Abi {
    pub const ALL: [Abi; 6] = [
        Abi::SysVX64,
        Abi::WindowsX64,
        Abi::LinuxAArch64,
        Abi::SysVPpc64le,
        Abi::AixPpc64,
        Abi::SysVS390x,
    ];

    /// The ABI used by native code on `platform`.
    pub fn for_platform(platform: Platform) -> Result<Self, AbiError> {
        match (platform.arch, platform.os) {
            (Arch::X64, Os::Windows) => Ok(Abi::WindowsX64),
            (Arch::X64, Os::Linux | Os::MacOs) => Ok(Abi::SysVX64),
            (Arch::AArch64, Os::Linux) => Ok(Abi::LinuxAArch64),
            (Arch::Ppc64le, Os::Linux) => Ok(Abi::SysVPpc64le),
            (Arch::Ppc64, Os::Aix) => Ok(Abi::AixPpc64),
            (Arch::S390x, Os::Linux) => Ok(Abi::SysVS390x),
            (arch, os) => Err(AbiError::UnsupportedPlatform { arch, os }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Abi::SysVX64 => "sysv-x64",
            Abi::WindowsX64 => "win64",
            Abi::LinuxAArch64 => "aarch64-linux",
            Abi::SysVPpc64le => "ppc64le-sysv",
            Abi::AixPpc64 => "ppc64-aix",
            Abi::SysVS390x => "s390x-sysv",
        }
    }

    pub fn byte_order(self) -> ByteOrder {
        match self {
            Abi::AixPpc64 | Abi::SysVS390x => ByteOrder::BigEndian,
            _ => ByteOrder::LittleEndian,
        }
    }

    pub fn registers(self) -> RegisterFile {
        match self {
            Abi::SysVX64 => x64::sysv::REGISTERS,
            Abi::WindowsX64 => x64::windows::REGISTERS,
            Abi::LinuxAArch64 => aarch64::REGISTERS,
            Abi::SysVPpc64le | Abi::AixPpc64 => ppc64::REGISTERS,
            Abi::SysVS390x => s390x::REGISTERS,
        }
    }

    /// Whether a single precision value sits in a floating point register
    /// in double precision format.
    pub fn widens_float_registers(self) -> bool {
        matches!(self, Abi::SysVPpc64le | Abi::AixPpc64 | Abi::SysVS390x)
    }

    /// Classify `layout` with this ABI's type classes.
    pub fn classify(self, layout: &MemoryLayout) -> Result<Classification, AbiError> {
        Ok(match self {
            Abi::SysVX64 => Classification::SysVX64(x64::sysv::classify_layout(layout)?),
            Abi::WindowsX64 => Classification::WindowsX64(x64::windows::classify_layout(layout)?),
            Abi::LinuxAArch64 => Classification::LinuxAArch64(aarch64::classify_layout(layout)?),
            Abi::SysVPpc64le | Abi::AixPpc64 => Classification::Ppc64(ppc64::classify_layout(layout)?),
            Abi::SysVS390x => Classification::S390x(s390x::classify_layout(layout)?),
        })
    }

    /// Register accessor used to marshal a scalar of `layout`.
    pub fn classify_accessor(self, layout: &ValueLayout) -> Accessor {
        match self {
            Abi::SysVPpc64le | Abi::AixPpc64 => ppc64::classify_accessor(layout),
            Abi::SysVS390x => s390x::classify_accessor(layout),
            Abi::SysVX64 | Abi::WindowsX64 | Abi::LinuxAArch64 => natural_accessor(layout),
        }
    }

    /// Produce the binding plan for `descriptor`.
    ///
    /// Every layout is validated first; an unsupported layout anywhere in the
    /// signature fails the whole arrangement.
    pub fn arrange(self, descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
        check_signature(descriptor, options)?;
        let sequence = match self {
            Abi::SysVX64 => x64::sysv::arrange(descriptor, options)?,
            Abi::WindowsX64 => x64::windows::arrange(descriptor, options)?,
            Abi::LinuxAArch64 => aarch64::arrange(descriptor, options)?,
            Abi::SysVPpc64le => ppc64::sysv::arrange(descriptor, options)?,
            Abi::AixPpc64 => ppc64::aix::arrange(descriptor, options)?,
            Abi::SysVS390x => s390x::arrange(descriptor, options)?,
        };
        #[cfg(feature = "logging")]
        for (index, binding) in sequence.arguments().iter().enumerate() {
            trace!(abi = %self, index, ?binding, "argument binding");
        }
        Ok(sequence)
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Abi {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Abi::ALL
            .into_iter()
            .find(|abi| abi.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AbiError::UnknownAbi(s.to_string()))
    }
}

/// An ABI-specific type class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    SysVX64(x64::sysv::TypeClass),
    WindowsX64(x64::windows::TypeClass),
    LinuxAArch64(aarch64::TypeClass),
    Ppc64(ppc64::TypeClass),
    S390x(s390x::TypeClass),
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::SysVX64(c) => c.fmt(f),
            Classification::WindowsX64(c) => c.fmt(f),
            Classification::LinuxAArch64(c) => c.fmt(f),
            Classification::Ppc64(c) => c.fmt(f),
            Classification::S390x(c) => c.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_for_platform() {
        assert_eq!(
            Abi::for_platform(Platform::new(Arch::X64, Os::Linux)).unwrap(),
            Abi::SysVX64
        );
        assert_eq!(
            Abi::for_platform(Platform::new(Arch::Ppc64, Os::Aix)).unwrap(),
            Abi::AixPpc64
        );
        assert!(matches!(
            Abi::for_platform(Platform::new(Arch::S390x, Os::Zos)),
            Err(AbiError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_abi_names_round_trip() {
        for abi in Abi::ALL {
            assert_eq!(abi.name().parse::<Abi>().unwrap(), abi);
        }
        assert!("vax".parse::<Abi>().is_err());
    }

    #[test]
    fn test_padding_argument_aborts_arrangement() {
        let desc = FunctionDescriptor::of_void([
            ValueLayout::INT.into(),
            MemoryLayout::padding_layout(4).unwrap(),
        ]);
        for abi in Abi::ALL {
            assert!(matches!(
                abi.arrange(&desc, &LinkerOptions::default()),
                Err(AbiError::UnsupportedLayout(_))
            ));
        }
    }
}
