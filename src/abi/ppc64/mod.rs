//! 64-bit PowerPC calling conventions.
//!
//! Both PPC64 ABIs map arguments onto a doubleword-positional parameter
//! area: argument doubleword `k` is passed in GPR `r3 + k` while `k < 8`,
//! and in the parameter save area otherwise. A floating point argument takes
//! the next FPR but still consumes its doubleword.

pub mod aix;
pub mod sysv;

use std::fmt;

use crate::abi::{
    Abi, AbiError, Accessor, ArgumentBinding, CallingSequence, ChunkKind, FunctionDescriptor,
    LinkerOptions, RegisterFile, ReturnBinding, STACK_SLOT_SIZE, Storage, StructChunk,
    homogeneous_float_members, raw_chunks,
};
use crate::layout::{Carrier, MemoryLayout, ValueLayout};
use crate::memory::align_to;

pub const REGISTERS: RegisterFile = RegisterFile {
    gprs: &["r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10"],
    fprs: &[
        "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13",
    ],
    arg_gprs: 8,
    arg_fprs: 13,
};

pub(crate) const R3: Storage = Storage::Gpr { index: 0, name: "r3" };
pub(crate) const F1: Storage = Storage::Fpr { index: 0, name: "f1" };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Integer and floating point scalars.
    Primitive,
    Pointer,
    Struct,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeClass::Primitive => "PRIMITIVE",
            TypeClass::Pointer => "POINTER",
            TypeClass::Struct => "STRUCT",
        })
    }
}

pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, AbiError> {
    match layout {
        MemoryLayout::Value(value) if value.carrier() == Carrier::Address => Ok(TypeClass::Pointer),
        MemoryLayout::Value(_) => Ok(TypeClass::Primitive),
        MemoryLayout::Group(_) => Ok(TypeClass::Struct),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

/// Sub-doubleword integers widen to a long and `float` widens to `double`;
/// long, double and address use their own width.
pub fn classify_accessor(layout: &ValueLayout) -> Accessor {
    match layout.carrier() {
        Carrier::Float | Carrier::Double => Accessor::Double,
        Carrier::Address => Accessor::Address,
        _ => Accessor::Long,
    }
}

/// Parameters that differ between the ELFv2 and AIX flavours.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Flavor {
    pub abi: Abi,
    /// Offset of the parameter save area from the stack pointer.
    pub parameter_area_offset: u64,
    /// Largest homogeneous float aggregate passed in FPRs, 0 for none.
    pub max_hfa_members: usize,
    /// GPR chunks hold the memory image from the most significant byte.
    pub left_justified: bool,
}

/// Hands out doublewords of the parameter area and FPRs.
#[derive(Debug)]
pub(crate) struct DoublewordAllocator {
    flavor: Flavor,
    next_doubleword: u64,
    next_fpr: usize,
}

impl DoublewordAllocator {
    pub(crate) fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            next_doubleword: 0,
            next_fpr: 0,
        }
    }

    fn doubleword(&self, k: u64) -> Storage {
        if let Some(gpr) = usize::try_from(k).ok().filter(|k| *k < REGISTERS.arg_gprs) {
            if let Some(storage) = REGISTERS.gpr(gpr) {
                return storage;
            }
        }
        Storage::Stack {
            offset: self.flavor.parameter_area_offset + k * STACK_SLOT_SIZE,
            size: STACK_SLOT_SIZE,
        }
    }

    /// Consume `count` doublewords and return their storage.
    pub(crate) fn take(&mut self, count: u64) -> Vec<Storage> {
        let start = self.next_doubleword;
        self.next_doubleword += count;
        (start..start + count).map(|k| self.doubleword(k)).collect()
    }

    pub(crate) fn fprs_left(&self) -> usize {
        REGISTERS.arg_fprs.saturating_sub(self.next_fpr)
    }

    pub(crate) fn fpr(&mut self) -> Option<Storage> {
        let storage = REGISTERS.fpr(self.next_fpr).filter(|_| self.fprs_left() > 0)?;
        self.next_fpr += 1;
        Some(storage)
    }

    pub(crate) fn stack_size(&self) -> u64 {
        let doublewords = self.next_doubleword.max(REGISTERS.arg_gprs as u64);
        align_to(self.flavor.parameter_area_offset + doublewords * STACK_SLOT_SIZE, 16)
    }

    fn arrange_scalar(&mut self, value: &ValueLayout, variadic: bool) -> ArgumentBinding {
        let accessor = classify_accessor(value);
        let mut storage = Vec::with_capacity(2);
        if value.carrier().is_floating() {
            if let Some(fpr) = self.fpr() {
                storage.push(fpr);
                let shadow = self.take(1);
                if variadic {
                    storage.extend(shadow);
                }
                return ArgumentBinding::Value { accessor, storage };
            }
        }
        storage.extend(self.take(1));
        ArgumentBinding::Value { accessor, storage }
    }

    fn arrange_struct(&mut self, layout: &MemoryLayout, variadic: bool) -> ArgumentBinding {
        let size = layout.byte_size();
        let doublewords = size.div_ceil(STACK_SLOT_SIZE);
        if !variadic && self.flavor.max_hfa_members > 0 {
            if let Some((carrier, offsets)) = homogeneous_float_members(layout, self.flavor.max_hfa_members) {
                if self.fprs_left() >= offsets.len() {
                    let chunks = offsets
                        .into_iter()
                        .filter_map(|offset| {
                            self.fpr().map(|storage| float_chunk(carrier, offset, storage))
                        })
                        .collect();
                    self.take(doublewords);
                    return ArgumentBinding::Struct { size, chunks };
                }
            }
        }
        let storage = self.take(doublewords);
        ArgumentBinding::Struct {
            size,
            chunks: raw_chunks(size, storage, self.flavor.left_justified),
        }
    }
}

pub(crate) fn float_chunk(carrier: Carrier, offset: u64, storage: Storage) -> StructChunk {
    StructChunk {
        offset,
        size: carrier.byte_size(),
        storage,
        kind: if carrier == Carrier::Float {
            ChunkKind::Float
        } else {
            ChunkKind::Double
        },
    }
}

pub(crate) fn scalar_return(value: &ValueLayout) -> ReturnBinding {
    ReturnBinding::Value {
        accessor: classify_accessor(value),
        storage: if value.carrier().is_floating() { F1 } else { R3 },
    }
}

/// Arrange the arguments after the return binding has been decided.
pub(crate) fn arrange_with(
    flavor: Flavor,
    descriptor: &FunctionDescriptor,
    options: &LinkerOptions,
    ret: ReturnBinding,
) -> Result<CallingSequence, AbiError> {
    let mut alloc = DoublewordAllocator::new(flavor);
    if matches!(ret, ReturnBinding::InMemory { .. }) {
        alloc.take(1);
    }
    let mut arguments = Vec::with_capacity(descriptor.argument_layouts().len());
    for (index, layout) in descriptor.argument_layouts().iter().enumerate() {
        let variadic = options.is_variadic_arg(index);
        let binding = match (classify_layout(layout)?, layout) {
            (_, MemoryLayout::Value(value)) => alloc.arrange_scalar(value, variadic),
            _ => alloc.arrange_struct(layout, variadic),
        };
        arguments.push(binding);
    }
    Ok(CallingSequence {
        abi: flavor.abi,
        descriptor: descriptor.clone(),
        options: *options,
        arguments,
        ret,
        stack_size: alloc.stack_size(),
        vector_count: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_classes() {
        assert_eq!(classify_layout(&ValueLayout::FLOAT.into()).unwrap(), TypeClass::Primitive);
        assert_eq!(classify_layout(&ValueLayout::ADDRESS.into()).unwrap(), TypeClass::Pointer);
        let group = MemoryLayout::struct_layout([MemoryLayout::from(ValueLayout::INT)]).unwrap();
        assert_eq!(classify_layout(&group).unwrap(), TypeClass::Struct);
    }

    #[test]
    fn test_accessor_promotion() {
        assert_eq!(classify_accessor(&ValueLayout::BYTE), Accessor::Long);
        assert_eq!(classify_accessor(&ValueLayout::INT), Accessor::Long);
        assert_eq!(classify_accessor(&ValueLayout::FLOAT), Accessor::Double);
        assert_eq!(classify_accessor(&ValueLayout::ADDRESS), Accessor::Address);
    }
}
