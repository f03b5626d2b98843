//! Loading native libraries.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use super::{LookupError, TableSource};

/// A loaded native library.
pub trait NativeLibrary: Send + Sync {
    /// Address of the exported symbol `name`.
    fn lookup(&self, name: &str) -> Option<u64>;

    /// Read `len` function addresses from the library's fallback table.
    fn function_table(&self, source: TableSource, len: usize) -> Result<Vec<u64>, LookupError>;

    /// Where the library was loaded from, for diagnostics.
    fn describe(&self) -> String;
}

/// Loads native libraries.
pub trait LibraryLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LookupError>;

    /// The libraries already loaded into the process.
    fn default_library(&self) -> Result<Box<dyn NativeLibrary>, LookupError>;
}

/// [`LibraryLoader`] backed by the platform dynamic loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLibraryLoader;

struct DynamicLibrary {
    library: libloading::Library,
    path: Option<PathBuf>,
}

impl LibraryLoader for DynamicLibraryLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LookupError> {
        // SAFETY: loading runs the library's initialisers. Only C runtime
        // and helper libraries are loaded through this path.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| LookupError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(DynamicLibrary {
            library,
            path: Some(path.to_path_buf()),
        }))
    }

    fn default_library(&self) -> Result<Box<dyn NativeLibrary>, LookupError> {
        #[cfg(unix)]
        let library: libloading::Library = libloading::os::unix::Library::this().into();
        #[cfg(windows)]
        let library: libloading::Library = libloading::os::windows::Library::this()
            .map_err(|e| LookupError::Load {
                path: "<process>".to_string(),
                message: e.to_string(),
            })?
            .into();
        Ok(Box::new(DynamicLibrary { library, path: None }))
    }
}

impl NativeLibrary for DynamicLibrary {
    fn lookup(&self, name: &str) -> Option<u64> {
        // SAFETY: the symbol is read as an address and never dereferenced.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        let address = *symbol as usize as u64;
        (address != 0).then_some(address)
    }

    fn function_table(&self, source: TableSource, len: usize) -> Result<Vec<u64>, LookupError> {
        let missing = |symbol: &str| LookupError::MissingSymbol {
            library: self.describe(),
            symbol: symbol.to_string(),
        };
        let table: *const *const c_void = match source {
            TableSource::Symbol(name) => self.lookup(name).ok_or_else(|| missing(name))? as usize as *const *const c_void,
            TableSource::Getter(name) => {
                // SAFETY: the helper library exports `name` as `void **name(void)`.
                let getter = unsafe {
                    self.library
                        .get::<unsafe extern "C" fn() -> *const *const c_void>(name.as_bytes())
                }
                .map_err(|_| missing(name))?;
                // SAFETY: the getter takes no arguments and only returns a pointer.
                unsafe { getter() }
            }
        };
        if table.is_null() {
            return Err(LookupError::NullTable(self.describe()));
        }
        // SAFETY: the helper library's table has one entry per fallback
        // symbol, and `len` is the length of that list.
        Ok((0..len).map(|i| unsafe { *table.add(i) } as usize as u64).collect())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "<default library>".to_string(),
        }
    }
}
