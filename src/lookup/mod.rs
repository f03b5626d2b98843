//! Symbol lookup.
//!
//! A [`SymbolLookup`] maps a symbol name to the address of a native
//! function or global. [`LibraryLookup`] searches one library loaded from a
//! path; [`SystemLookup`] searches the platform's C library, consulting a
//! fallback function table for the names the C library does not export.
//!
//! # Example
//!
//! ```rust,ignore
//! use foreign_linker::lookup::SymbolLookup;
//!
//! let lookup = linker.default_lookup();
//! let strlen = lookup.find("strlen");
//! ```

mod error;
mod library;
mod system;
mod tables;
mod zos_symbols;

use std::path::Path;

pub use error::LookupError;
pub use library::{DynamicLibraryLoader, LibraryLoader, NativeLibrary};
pub use system::{SystemLookup, helper_library_path};
pub use tables::{FallbackTable, TableSource};

/// Finds the address of a symbol by name.
pub trait SymbolLookup {
    /// Address of `name`, or `None` when this lookup does not know it.
    fn find(&self, name: &str) -> Option<u64>;

    fn find_or_err(&self, name: &str) -> Result<u64, LookupError> {
        self.find(name)
            .ok_or_else(|| LookupError::SymbolNotFound(name.to_string()))
    }

    /// A lookup that tries `self` first, then `other`.
    fn or<L: SymbolLookup>(self, other: L) -> Or<Self, L>
    where
        Self: Sized,
    {
        Or {
            first: self,
            second: other,
        }
    }
}

/// Two lookups consulted in order. See [`SymbolLookup::or`].
#[derive(Debug)]
pub struct Or<A, B> {
    first: A,
    second: B,
}

impl<A: SymbolLookup, B: SymbolLookup> SymbolLookup for Or<A, B> {
    fn find(&self, name: &str) -> Option<u64> {
        self.first.find(name).or_else(|| self.second.find(name))
    }
}

impl<L: SymbolLookup + ?Sized> SymbolLookup for &L {
    fn find(&self, name: &str) -> Option<u64> {
        (**self).find(name)
    }
}

/// Lookup over a single native library.
pub struct LibraryLookup {
    library: Box<dyn NativeLibrary>,
}

impl LibraryLookup {
    /// Load the library at `path` with the platform loader.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        Self::with_loader(path, &DynamicLibraryLoader)
    }

    pub fn with_loader(path: impl AsRef<Path>, loader: &dyn LibraryLoader) -> Result<Self, LookupError> {
        Ok(Self {
            library: loader.load(path.as_ref())?,
        })
    }
}

impl SymbolLookup for LibraryLookup {
    fn find(&self, name: &str) -> Option<u64> {
        if contains_nul(name) {
            return None;
        }
        self.library.lookup(name).filter(|address| *address != 0)
    }
}

impl std::fmt::Debug for LibraryLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLookup")
            .field("library", &self.library.describe())
            .finish()
    }
}

/// Names with an interior NUL cannot be passed to the native loader.
pub(crate) fn contains_nul(name: &str) -> bool {
    name.contains('\0')
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::testing::*;
    use super::*;
    use crate::abi::{Arch, Os, Platform};
    use crate::config::LookupConfig;

    fn config(dir: &std::path::Path) -> LookupConfig {
        LookupConfig {
            library_dir: Some(dir.to_path_buf()),
            system_root: Some(dir.to_path_buf()),
            ..LookupConfig::default()
        }
    }

    fn platform(arch: Arch, os: Os) -> Platform {
        Platform { arch, os }
    }

    #[test]
    fn test_linux_uses_helper_library() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::default().with("libsyslookup.so", library("syslookup", &[("strlen", 0x1000)]));
        let lookup = SystemLookup::new(platform(Arch::X64, Os::Linux), &config(dir.path()), &loader);

        assert_eq!(lookup.find("strlen"), Some(0x1000));
        assert_eq!(lookup.find("nope"), None);
        assert_eq!(loader.loaded.lock().as_slice(), &[dir.path().join("libsyslookup.so")]);
    }

    #[test]
    fn test_nul_in_name_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::default().with("libsyslookup.so", library("syslookup", &[("strlen", 0x1000)]));
        let lookup = SystemLookup::new(platform(Arch::X64, Os::Linux), &config(dir.path()), &loader);

        assert_eq!(lookup.find("strlen\0"), None);
        assert!(matches!(lookup.find_or_err("str\0len"), Err(LookupError::SymbolNotFound(_))));
    }

    #[test]
    fn test_failed_bring_up_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = SystemLookup::new(platform(Arch::X64, Os::Linux), &config(dir.path()), &FakeLoader::default());
        assert!(lookup.is_empty());
        assert_eq!(lookup.find("strlen"), None);
    }

    #[test]
    fn test_aix_consults_table_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut helper = library("syslookup", &[]);
        let mut table = vec![0; 16];
        table[12] = 0xAAAA;
        helper.table = Some(table);
        let loader = FakeLoader {
            default: Some(library("default", &[("strcmp", 0xBBBB), ("printf", 0xCCCC)])),
            ..FakeLoader::default()
        }
        .with("libsyslookup.so", helper);
        let lookup = SystemLookup::new(platform(Arch::Ppc64, Os::Aix), &config(dir.path()), &loader);

        assert_eq!(lookup.find("strcmp"), Some(0xAAAA));
        assert_eq!(lookup.find("printf"), Some(0xCCCC));
        // Null table entries fall through to the default library.
        assert_eq!(lookup.find("bcopy"), None);
    }

    #[test]
    fn test_aix_prefers_archive_when_only_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libsyslookup.a"), b"").unwrap();
        let path = helper_library_path(Os::Aix, &config(dir.path()));
        assert_eq!(path, dir.path().join("libsyslookup.a"));

        std::fs::write(dir.path().join("libsyslookup.so"), b"").unwrap();
        let path = helper_library_path(Os::Aix, &config(dir.path()));
        assert_eq!(path, dir.path().join("libsyslookup.so"));
    }

    #[test]
    fn test_windows_ucrt_with_fallback_table() {
        let dir = tempfile::tempdir().unwrap();
        let system32 = dir.path().join("System32");
        std::fs::create_dir(&system32).unwrap();
        std::fs::write(system32.join("ucrtbase.dll"), b"").unwrap();

        let mut helper = library("syslookup", &[]);
        helper.table = Some((1..=52).map(|i| 0x9000 + i).collect());
        let loader = FakeLoader::default()
            .with("ucrtbase.dll", library("ucrtbase", &[("strlen", 0x1000), ("printf", 0x2000)]))
            .with("syslookup.dll", helper);
        let lookup = SystemLookup::new(platform(Arch::X64, Os::Windows), &config(dir.path()), &loader);

        // The CRT wins when it exports the name.
        assert_eq!(lookup.find("printf"), Some(0x2000));
        assert_eq!(lookup.find("fprintf"), Some(0x9001));
        assert_eq!(lookup.find("gmtime"), Some(0x9000 + 52));
    }

    #[test]
    fn test_windows_without_ucrt_uses_msvcrt() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FakeLoader::default().with("msvcrt.dll", library("msvcrt", &[("printf", 0x3000)]));
        let lookup = SystemLookup::new(platform(Arch::X64, Os::Windows), &config(dir.path()), &loader);

        assert_eq!(lookup.find("printf"), Some(0x3000));
        assert_eq!(lookup.find("fprintf"), None);
        assert_eq!(loader.loaded.lock().as_slice(), &[dir.path().join("System32").join("msvcrt.dll")]);
    }

    #[test]
    fn test_or_and_library_lookup() {
        let loader = FakeLoader::default()
            .with("liba.so", library("a", &[("one", 1)]))
            .with("libb.so", library("b", &[("one", 10), ("two", 2)]));
        let a = LibraryLookup::with_loader(PathBuf::from("/x/liba.so"), &loader).unwrap();
        let b = LibraryLookup::with_loader(PathBuf::from("/x/libb.so"), &loader).unwrap();
        let both = a.or(&b);

        assert_eq!(both.find("one"), Some(1));
        assert_eq!(both.find("two"), Some(2));
        assert!(matches!(both.find_or_err("three"), Err(LookupError::SymbolNotFound(n)) if n == "three"));
        assert!(LibraryLookup::with_loader("/x/libc.so", &loader).is_err());
    }
}
