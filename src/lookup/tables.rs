//! Fallback function tables.
//!
//! Each list is the export order of the `funcs` table in the helper library
//! built for that platform; a symbol's position is its slot in the table.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::abi::Os;

use super::zos_symbols;

/// C library functions that AIX only provides as macros or inlines.
pub(crate) static AIX_SYMBOLS: &[&str] = &[
    "bcopy", "endfsent", "getfsent", "getfsfile", "getfsspec", "longjmp", "memcpy", "memmove",
    "setfsent", "setjmp", "siglongjmp", "strcat", "strcmp", "strcpy", "strncat", "strncpy",
];

/// Functions missing from `ucrtbase.dll` because the UCRT headers inline them.
pub(crate) static WINDOWS_SYMBOLS: &[&str] = &[
    // stdio
    "fprintf", "fprintf_s", "fscanf", "fscanf_s", "fwprintf", "fwprintf_s", "fwscanf",
    "fwscanf_s", "printf", "printf_s", "scanf", "scanf_s", "snprintf", "sprintf", "sprintf_s",
    "sscanf", "sscanf_s", "swprintf", "swprintf_s", "swscanf", "swscanf_s", "vfprintf",
    "vfprintf_s", "vfscanf", "vfscanf_s", "vfwprintf", "vfwprintf_s", "vfwscanf", "vfwscanf_s",
    "vprintf", "vprintf_s", "vscanf", "vscanf_s", "vsnprintf", "vsnprintf_s", "vsprintf",
    "vsprintf_s", "vsscanf", "vsscanf_s", "vswprintf", "vswprintf_s", "vswscanf", "vswscanf_s",
    "vwprintf", "vwprintf_s", "vwscanf", "vwscanf_s", "wprintf", "wprintf_s", "wscanf",
    "wscanf_s",
    // time
    "gmtime",
];

fn index(symbols: &'static [&'static str]) -> HashMap<&'static str, usize> {
    symbols.iter().enumerate().map(|(i, name)| (*name, i)).collect()
}

static AIX_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| index(AIX_SYMBOLS));
static ZOS_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| index(zos_symbols::SYMBOLS));
static WINDOWS_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| index(WINDOWS_SYMBOLS));

/// How the helper library exposes its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    /// The exported symbol is the table itself.
    Symbol(&'static str),
    /// The exported symbol is a `void **(void)` function returning the table.
    Getter(&'static str),
}

/// A fallback table: symbol names and where to find their addresses.
#[derive(Debug, Clone, Copy)]
pub struct FallbackTable {
    pub os: Os,
    pub symbols: &'static [&'static str],
    pub source: TableSource,
    index: &'static Lazy<HashMap<&'static str, usize>>,
}

impl FallbackTable {
    /// The table used on `os`, if it has one.
    pub fn for_os(os: Os) -> Option<Self> {
        let (symbols, source, index) = match os {
            Os::Aix => (AIX_SYMBOLS, TableSource::Getter("funcs_addr"), &AIX_INDEX),
            Os::Zos => (zos_symbols::SYMBOLS, TableSource::Getter("funcs_addr"), &ZOS_INDEX),
            Os::Windows => (WINDOWS_SYMBOLS, TableSource::Symbol("funcs"), &WINDOWS_INDEX),
            Os::Linux | Os::MacOs => return None,
        };
        Some(Self {
            os,
            symbols,
            source,
            index,
        })
    }

    /// Slot of `name` in the table.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_table_order() {
        let aix = FallbackTable::for_os(Os::Aix).unwrap();
        assert_eq!(aix.len(), 16);
        assert_eq!(aix.slot("bcopy"), Some(0));
        assert_eq!(aix.slot("strcmp"), Some(12));
        assert_eq!(aix.slot("strncpy"), Some(15));
        assert_eq!(aix.slot("printf"), None);

        let windows = FallbackTable::for_os(Os::Windows).unwrap();
        assert_eq!(windows.slot("gmtime"), Some(windows.len() - 1));
        assert_eq!(windows.source, TableSource::Symbol("funcs"));
        assert!(FallbackTable::for_os(Os::Linux).is_none());
    }

    #[test]
    fn test_zos_table() {
        let zos = FallbackTable::for_os(Os::Zos).unwrap();
        assert_eq!(zos.slot("abort"), Some(0));
        assert_eq!(zos.slot("yn"), Some(zos.len() - 1));
        assert!(zos.slot("__e2a_l").is_some());
        assert_eq!(zos.source, TableSource::Getter("funcs_addr"));
    }

    #[test]
    fn test_no_duplicate_names() {
        for os in [Os::Aix, Os::Zos, Os::Windows] {
            let table = FallbackTable::for_os(os).unwrap();
            assert_eq!(table.index.len(), table.len(), "{}", os);
        }
    }
}
