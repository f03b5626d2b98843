//! The lookup for the platform's C library.
//!
//! Where the default C library lacks functions that headers provide as
//! macros or inlines, a small helper library exports a table of their
//! addresses, and the lookup consults it by slot.

use std::path::PathBuf;

use crate::abi::{Os, Platform};
use crate::config::LookupConfig;
use crate::logging::{info, warn};

use super::{FallbackTable, LibraryLoader, LookupError, NativeLibrary, SymbolLookup, contains_nul};

/// Function addresses read from a fallback table.
struct FallbackFunctions {
    table: FallbackTable,
    addresses: Vec<u64>,
}

impl FallbackFunctions {
    fn read(library: &dyn NativeLibrary, table: FallbackTable) -> Result<Self, LookupError> {
        let addresses = library.function_table(table.source, table.len())?;
        Ok(Self { table, addresses })
    }

    fn find(&self, name: &str) -> Option<u64> {
        let slot = self.table.slot(name)?;
        self.addresses.get(slot).copied().filter(|address| *address != 0)
    }
}

/// Symbol lookup over the platform's C library.
///
/// Bring-up never fails: when a library cannot be loaded the lookup is
/// empty and finds nothing.
pub struct SystemLookup {
    primary: Option<Box<dyn NativeLibrary>>,
    fallback: Option<FallbackFunctions>,
    /// Consult the fallback table before the primary library.
    fallback_first: bool,
}

impl SystemLookup {
    /// A lookup that finds nothing.
    pub fn empty() -> Self {
        Self {
            primary: None,
            fallback: None,
            fallback_first: false,
        }
    }

    pub fn new(platform: Platform, config: &LookupConfig, loader: &dyn LibraryLoader) -> Self {
        match Self::try_new(platform.os, config, loader) {
            Ok(lookup) => {
                info!(
                    os = %platform.os,
                    library = %lookup.primary.as_ref().map(|l| l.describe()).unwrap_or_default(),
                    fallback = lookup.fallback.as_ref().map(|f| f.addresses.len()).unwrap_or_default(),
                    "system lookup ready"
                );
                lookup
            }
            Err(_err) => {
                warn!(error = %_err, "system lookup unavailable, using empty lookup");
                Self::empty()
            }
        }
    }

    fn try_new(os: Os, config: &LookupConfig, loader: &dyn LibraryLoader) -> Result<Self, LookupError> {
        match os {
            Os::Windows => Self::windows(config, loader),
            Os::Aix | Os::Zos => {
                let helper = loader.load(&helper_library_path(os, config))?;
                let fallback = FallbackTable::for_os(os)
                    .map(|table| FallbackFunctions::read(helper.as_ref(), table))
                    .transpose()?;
                Ok(Self {
                    primary: Some(loader.default_library()?),
                    fallback,
                    fallback_first: true,
                })
            }
            Os::Linux | Os::MacOs => Ok(Self {
                primary: Some(loader.load(&helper_library_path(os, config))?),
                fallback: None,
                fallback_first: false,
            }),
        }
    }

    /// `ucrtbase.dll` when it exists, with the helper library's table for
    /// the functions it lacks; `msvcrt.dll` otherwise.
    fn windows(config: &LookupConfig, loader: &dyn LibraryLoader) -> Result<Self, LookupError> {
        let system32 = config.system_root().ok_or(LookupError::MissingSystemRoot)?.join("System32");
        let ucrtbase = system32.join("ucrtbase.dll");
        if !ucrtbase.exists() {
            return Ok(Self {
                primary: Some(loader.load(&system32.join("msvcrt.dll"))?),
                fallback: None,
                fallback_first: false,
            });
        }
        let crt = loader.load(&ucrtbase)?;
        let helper = loader.load(&helper_library_path(Os::Windows, config))?;
        let fallback = FallbackTable::for_os(Os::Windows)
            .map(|table| FallbackFunctions::read(helper.as_ref(), table))
            .transpose()?;
        Ok(Self {
            primary: Some(crt),
            fallback,
            fallback_first: false,
        })
    }

    /// True when bring-up failed and nothing can be found.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.fallback.is_none()
    }
}

impl SymbolLookup for SystemLookup {
    fn find(&self, name: &str) -> Option<u64> {
        if contains_nul(name) {
            return None;
        }
        let primary = || self.primary.as_ref().and_then(|library| library.lookup(name));
        let fallback = || self.fallback.as_ref().and_then(|table| table.find(name));
        if self.fallback_first {
            fallback().or_else(primary)
        } else {
            primary().or_else(fallback)
        }
    }
}

impl std::fmt::Debug for SystemLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLookup")
            .field("primary", &self.primary.as_ref().map(|l| l.describe()))
            .field("fallback", &self.fallback.as_ref().map(|t| t.table.os))
            .field("fallback_first", &self.fallback_first)
            .finish()
    }
}

/// Path of the helper library, preferring the platform's alternative file
/// name when only that one exists.
pub fn helper_library_path(os: Os, config: &LookupConfig) -> PathBuf {
    let dir = config.library_dir(os);
    let primary = dir.join(os.library_file_name(&config.helper_library));
    match os.alternative_library_file_name(&config.helper_library) {
        Some(alternative) if !primary.exists() && dir.join(&alternative).exists() => dir.join(alternative),
        _ => primary,
    }
}
