//! Procedure Call Standard for the Arm 64-bit Architecture, as used on Linux.
//!
//! Homogeneous floating point aggregates of up to four members go in
//! consecutive vector registers. Other composites of up to 16 bytes use one
//! or two consecutive integer registers, and larger ones are passed as a
//! pointer to a copy. A composite that does not fit the remaining registers
//! goes to the stack, and no later argument of that class uses a register.

use std::fmt;

use crate::abi::{
    Abi, AbiError, ArgumentBinding, CallingSequence, ChunkKind, FunctionDescriptor, LinkerOptions,
    RegisterFile, ReturnBinding, Storage, StorageAllocator, StructChunk,
    homogeneous_float_members, natural_accessor, raw_chunks, stack_chunk,
};
use crate::layout::{Carrier, MemoryLayout};

pub const REGISTERS: RegisterFile = RegisterFile {
    gprs: &["x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8"],
    fprs: &["v0", "v1", "v2", "v3", "v4", "v5", "v6", "v7"],
    arg_gprs: 8,
    arg_fprs: 8,
};

/// Indirect result location register.
const X8: Storage = Storage::Gpr { index: 8, name: "x8" };

const MAX_HFA_MEMBERS: usize = 4;
const MAX_REGISTER_AGGREGATE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Integer,
    Float,
    Pointer,
    StructRegister,
    StructReference,
    /// Homogeneous floating point aggregate.
    StructHfa,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeClass::Integer => "INTEGER",
            TypeClass::Float => "FLOAT",
            TypeClass::Pointer => "POINTER",
            TypeClass::StructRegister => "STRUCT_REGISTER",
            TypeClass::StructReference => "STRUCT_REFERENCE",
            TypeClass::StructHfa => "STRUCT_HFA",
        })
    }
}

pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, AbiError> {
    match layout {
        MemoryLayout::Value(value) => Ok(match value.carrier() {
            Carrier::Float | Carrier::Double => TypeClass::Float,
            Carrier::Address => TypeClass::Pointer,
            _ => TypeClass::Integer,
        }),
        MemoryLayout::Group(group) => Ok(
            if homogeneous_float_members(layout, MAX_HFA_MEMBERS).is_some() {
                TypeClass::StructHfa
            } else if group.byte_size() > MAX_REGISTER_AGGREGATE {
                TypeClass::StructReference
            } else {
                TypeClass::StructRegister
            },
        ),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

fn hfa_chunks(layout: &MemoryLayout, registers: impl Iterator<Item = Storage>) -> Vec<StructChunk> {
    let Some((carrier, offsets)) = homogeneous_float_members(layout, MAX_HFA_MEMBERS) else {
        return Vec::new();
    };
    offsets
        .into_iter()
        .zip(registers)
        .map(|(offset, storage)| StructChunk {
            offset,
            size: carrier.byte_size(),
            storage,
            kind: ChunkKind::Raw {
                left_justified: false,
            },
        })
        .collect()
}

fn arrange_argument(layout: &MemoryLayout, alloc: &mut StorageAllocator) -> Result<ArgumentBinding, AbiError> {
    let size = layout.byte_size();
    Ok(match (classify_layout(layout)?, layout) {
        (TypeClass::Float, MemoryLayout::Value(value)) => ArgumentBinding::Value {
            accessor: natural_accessor(value),
            storage: vec![alloc.fpr_or_stack()],
        },
        (_, MemoryLayout::Value(value)) => ArgumentBinding::Value {
            accessor: natural_accessor(value),
            storage: vec![alloc.gpr_or_stack()],
        },
        (TypeClass::StructHfa, _) => {
            let members = homogeneous_float_members(layout, MAX_HFA_MEMBERS)
                .map(|(_, offsets)| offsets.len())
                .unwrap_or_default();
            if alloc.fprs_left() >= members {
                let registers: Vec<Storage> = (0..members).filter_map(|_| alloc.fpr()).collect();
                ArgumentBinding::Struct {
                    size,
                    chunks: hfa_chunks(layout, registers.into_iter()),
                }
            } else {
                alloc.exhaust_fprs();
                let storage = alloc.stack(size, layout.byte_alignment());
                ArgumentBinding::Struct {
                    size,
                    chunks: vec![stack_chunk(layout, storage)],
                }
            }
        }
        (TypeClass::StructRegister, _) => {
            let needed = size.div_ceil(8) as usize;
            if layout.byte_alignment() == 16 {
                alloc.align_gprs(2);
            }
            if alloc.gprs_left() >= needed {
                let registers: Vec<Storage> = (0..needed).filter_map(|_| alloc.gpr()).collect();
                ArgumentBinding::Struct {
                    size,
                    chunks: raw_chunks(size, registers, false),
                }
            } else {
                alloc.exhaust_gprs();
                let storage = alloc.stack(size, layout.byte_alignment());
                ArgumentBinding::Struct {
                    size,
                    chunks: vec![stack_chunk(layout, storage)],
                }
            }
        }
        _ => ArgumentBinding::StructReference {
            size,
            alignment: layout.byte_alignment(),
            storage: alloc.gpr_or_stack(),
        },
    })
}

fn arrange_return(layout: &MemoryLayout) -> Result<ReturnBinding, AbiError> {
    let size = layout.byte_size();
    Ok(match (classify_layout(layout)?, layout) {
        (TypeClass::Float, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: natural_accessor(value),
            storage: Storage::Fpr { index: 0, name: "v0" },
        },
        (_, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: natural_accessor(value),
            storage: Storage::Gpr { index: 0, name: "x0" },
        },
        (TypeClass::StructHfa, _) => ReturnBinding::Struct {
            size,
            chunks: hfa_chunks(layout, (0..MAX_HFA_MEMBERS).filter_map(|i| REGISTERS.fpr(i))),
        },
        (TypeClass::StructRegister, _) => ReturnBinding::Struct {
            size,
            chunks: raw_chunks(size, (0..2).filter_map(|i| REGISTERS.gpr(i)), false),
        },
        _ => ReturnBinding::InMemory {
            size,
            alignment: layout.byte_alignment(),
            pointer: X8,
            returned_in: None,
        },
    })
}

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let ret = match descriptor.return_layout() {
        Some(layout) => arrange_return(layout)?,
        None => ReturnBinding::Void,
    };
    let mut alloc = StorageAllocator::new(REGISTERS, 0);
    let arguments = descriptor
        .argument_layouts()
        .iter()
        .map(|layout| arrange_argument(layout, &mut alloc))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallingSequence {
        abi: Abi::LinuxAArch64,
        descriptor: descriptor.clone(),
        options: *options,
        arguments,
        ret,
        stack_size: alloc.stack_size(),
        vector_count: None,
    })
}
