//! Unified error type for the crate.

use thiserror::Error;

use crate::abi::AbiError;
use crate::config::ConfigError;
use crate::layout::LayoutError;
use crate::linker::LinkerError;
use crate::lookup::LookupError;
use crate::memory::MemoryError;
use crate::valist::VaListError;

/// Any error raised by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Linker(#[from] LinkerError),

    #[error(transparent)]
    VaList(#[from] VaListError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_and_keep_message() {
        fn lookup() -> Result<u64> {
            Err(LookupError::SymbolNotFound("strlen".to_string()))?
        }
        let err = lookup().unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
        assert_eq!(err.to_string(), "Symbol not found: strlen");
    }
}
