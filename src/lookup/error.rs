//! Error types for symbol lookup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Failed to load library '{path}': {message}")]
    Load { path: String, message: String },

    #[error("Library '{library}' does not export '{symbol}'")]
    MissingSymbol { library: String, symbol: String },

    #[error("Function table '{0}' is null")]
    NullTable(String),

    #[error("SystemRoot is not set")]
    MissingSystemRoot,
}
