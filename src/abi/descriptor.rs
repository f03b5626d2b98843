//! Function signatures and per-call linker options.

use std::fmt;
use std::str::FromStr;

use crate::layout::{MemoryLayout, parse_signature};

use super::AbiError;

/// Argument layouts in order, plus the return layout (`None` for void).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDescriptor {
    args: Vec<MemoryLayout>,
    ret: Option<MemoryLayout>,
}

impl FunctionDescriptor {
    pub fn of(ret: MemoryLayout, args: impl IntoIterator<Item = MemoryLayout>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ret: Some(ret),
        }
    }

    pub fn of_void(args: impl IntoIterator<Item = MemoryLayout>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ret: None,
        }
    }

    pub fn argument_layouts(&self) -> &[MemoryLayout] {
        &self.args
    }

    pub fn return_layout(&self) -> Option<&MemoryLayout> {
        self.ret.as_ref()
    }

    pub fn append_argument_layouts(mut self, args: impl IntoIterator<Item = MemoryLayout>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_return_layout(mut self, ret: MemoryLayout) -> Self {
        self.ret = Some(ret);
        self
    }

    pub fn with_void_return_layout(mut self) -> Self {
        self.ret = None;
        self
    }
}

impl fmt::Display for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for arg in &self.args {
            write!(f, "{}", arg)?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(ret) => write!(f, "{}", ret),
            None => write!(f, "v"),
        }
    }
}

impl FromStr for FunctionDescriptor {
    type Err = AbiError;

    /// Parses the `Display` form, e.g. `(i4[d8d8])v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (args, ret) = parse_signature(s)?;
        Ok(Self { args, ret })
    }
}

/// Options that change the call-site protocol of a bridge but not how its
/// arguments are classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LinkerOptions {
    first_variadic_arg: Option<usize>,
    critical: bool,
}

impl LinkerOptions {
    /// Arguments from `index` on are variadic.
    pub fn first_variadic_arg(index: usize) -> Self {
        Self {
            first_variadic_arg: Some(index),
            ..Self::default()
        }
    }

    /// The target neither blocks nor calls back, so no thread state
    /// transition is required around the call.
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn variadic_index(&self) -> Option<usize> {
        self.first_variadic_arg
    }

    pub fn is_variadic(&self) -> bool {
        self.first_variadic_arg.is_some()
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// True when argument `index` is part of the variadic tail.
    pub fn is_variadic_arg(&self, index: usize) -> bool {
        self.first_variadic_arg.is_some_and(|first| index >= first)
    }
}
