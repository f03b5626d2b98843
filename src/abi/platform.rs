//! Target platform identification.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[serde(alias = "x86_64", alias = "amd64")]
    X64,
    #[serde(alias = "arm64")]
    AArch64,
    /// Big-endian PPC64.
    Ppc64,
    Ppc64le,
    S390x,
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    #[serde(alias = "darwin")]
    MacOs,
    Windows,
    Aix,
    Zos,
}

impl Arch {
    /// Architecture of the host, if it is one this crate knows.
    pub fn host() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Arch::X64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Arch::AArch64)
        } else if cfg!(all(target_arch = "powerpc64", target_endian = "little")) {
            Some(Arch::Ppc64le)
        } else if cfg!(target_arch = "powerpc64") {
            Some(Arch::Ppc64)
        } else if cfg!(target_arch = "s390x") {
            Some(Arch::S390x)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::AArch64 => "aarch64",
            Arch::Ppc64 => "ppc64",
            Arch::Ppc64le => "ppc64le",
            Arch::S390x => "s390x",
        }
    }
}

impl Os {
    pub fn host() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Os::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Os::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Os::Windows)
        } else if cfg!(target_os = "aix") {
            Some(Os::Aix)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Windows => "windows",
            Os::Aix => "aix",
            Os::Zos => "zos",
        }
    }

    /// File name of a shared library called `name`, as the platform loader
    /// expects it.
    pub fn library_file_name(self, name: &str) -> String {
        match self {
            Os::Windows => format!("{}.dll", name),
            Os::MacOs => format!("lib{}.dylib", name),
            Os::Linux | Os::Aix | Os::Zos => format!("lib{}.so", name),
        }
    }

    /// Second file name to try when the first does not exist. AIX ships
    /// shared objects inside `.a` archives.
    pub fn alternative_library_file_name(self, name: &str) -> Option<String> {
        match self {
            Os::Aix => Some(format!("lib{}.a", name)),
            _ => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            "aarch64" | "arm64" => Ok(Arch::AArch64),
            "ppc64" => Ok(Arch::Ppc64),
            "ppc64le" => Ok(Arch::Ppc64le),
            "s390x" => Ok(Arch::S390x),
            other => Err(format!("unknown architecture '{}'", other)),
        }
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Os::Linux),
            "macos" | "darwin" => Ok(Os::MacOs),
            "windows" => Ok(Os::Windows),
            "aix" => Ok(Os::Aix),
            "zos" | "z/os" => Ok(Os::Zos),
            other => Err(format!("unknown operating system '{}'", other)),
        }
    }
}

/// An architecture and operating system pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub arch: Arch,
    pub os: Os,
}

impl Platform {
    pub const fn new(arch: Arch, os: Os) -> Self {
        Self { arch, os }
    }

    /// The host platform, if both halves are recognised.
    pub fn host() -> Option<Self> {
        Some(Self::new(Arch::host()?, Os::host()?))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Parses `arch-os`, e.g. `ppc64-aix`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (arch, os) = s
            .split_once('-')
            .ok_or_else(|| format!("expected 'arch-os', got '{}'", s))?;
        Ok(Self::new(arch.parse()?, os.parse()?))
    }
}
