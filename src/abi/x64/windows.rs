//! Microsoft x64 calling convention.
//!
//! Arguments are positional: argument `n` uses the `n`-th integer or vector
//! register, whichever matches its class, and the other register of that
//! position is skipped. Past four arguments everything goes to the stack,
//! after a 32-byte shadow area reserved for the register arguments.

use std::fmt;

use crate::abi::{
    Abi, AbiError, ArgumentBinding, CallingSequence, ChunkKind, FunctionDescriptor,
    LinkerOptions, RegisterFile, ReturnBinding, STACK_SLOT_SIZE, Storage, StructChunk,
    natural_accessor,
};
use crate::layout::{Carrier, MemoryLayout};
use crate::memory::align_to;

pub const REGISTERS: RegisterFile = RegisterFile {
    gprs: &["rcx", "rdx", "r8", "r9", "rax"],
    fprs: &["xmm0", "xmm1", "xmm2", "xmm3"],
    arg_gprs: 4,
    arg_fprs: 4,
};

const RCX: Storage = Storage::Gpr { index: 0, name: "rcx" };
const RAX: Storage = Storage::Gpr { index: 4, name: "rax" };
const XMM0: Storage = Storage::Fpr { index: 0, name: "xmm0" };

/// Bytes the caller reserves for the callee to spill register arguments.
pub const SHADOW_SPACE: u64 = 32;

const REGISTER_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Integer,
    Float,
    Pointer,
    /// Aggregate of 1, 2, 4 or 8 bytes, passed as an integer.
    StructRegister,
    /// Any other aggregate, passed as a pointer to a copy.
    StructReference,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeClass::Integer => "INTEGER",
            TypeClass::Float => "FLOAT",
            TypeClass::Pointer => "POINTER",
            TypeClass::StructRegister => "STRUCT_REGISTER",
            TypeClass::StructReference => "STRUCT_REFERENCE",
        })
    }
}

/// True for aggregate sizes that travel in a single integer register.
pub fn is_register_aggregate(size: u64) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, AbiError> {
    match layout {
        MemoryLayout::Value(value) => Ok(match value.carrier() {
            Carrier::Float | Carrier::Double => TypeClass::Float,
            Carrier::Address => TypeClass::Pointer,
            _ => TypeClass::Integer,
        }),
        MemoryLayout::Group(group) if is_register_aggregate(group.byte_size()) => {
            Ok(TypeClass::StructRegister)
        }
        MemoryLayout::Group(_) => Ok(TypeClass::StructReference),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

fn stack_slot(position: usize) -> Storage {
    let index = position.saturating_sub(REGISTER_SLOTS) as u64;
    Storage::Stack {
        offset: SHADOW_SPACE + index * STACK_SLOT_SIZE,
        size: STACK_SLOT_SIZE,
    }
}

fn integer_slot(position: usize) -> Storage {
    if position < REGISTER_SLOTS {
        REGISTERS.gpr(position).unwrap_or(stack_slot(position))
    } else {
        stack_slot(position)
    }
}

fn float_slot(position: usize) -> Storage {
    if position < REGISTER_SLOTS {
        REGISTERS.fpr(position).unwrap_or(stack_slot(position))
    } else {
        stack_slot(position)
    }
}

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let mut position = 0usize;
    let ret = match descriptor.return_layout() {
        None => ReturnBinding::Void,
        Some(layout) => match (classify_layout(layout)?, layout) {
            (TypeClass::Float, MemoryLayout::Value(value)) => ReturnBinding::Value {
                accessor: natural_accessor(value),
                storage: XMM0,
            },
            (_, MemoryLayout::Value(value)) => ReturnBinding::Value {
                accessor: natural_accessor(value),
                storage: RAX,
            },
            (TypeClass::StructRegister, _) => ReturnBinding::Struct {
                size: layout.byte_size(),
                chunks: vec![StructChunk {
                    offset: 0,
                    size: layout.byte_size(),
                    storage: RAX,
                    kind: ChunkKind::Raw {
                        left_justified: false,
                    },
                }],
            },
            _ => {
                position += 1;
                ReturnBinding::InMemory {
                    size: layout.byte_size(),
                    alignment: layout.byte_alignment(),
                    pointer: RCX,
                    returned_in: Some(RAX),
                }
            }
        },
    };

    let mut arguments = Vec::with_capacity(descriptor.argument_layouts().len());
    for (index, layout) in descriptor.argument_layouts().iter().enumerate() {
        let binding = match (classify_layout(layout)?, layout) {
            (TypeClass::Float, MemoryLayout::Value(value)) => {
                let mut storage = vec![float_slot(position)];
                // Variadic callees read floating point values from the
                // integer register of the same position.
                if options.is_variadic_arg(index) && position < REGISTER_SLOTS {
                    storage.push(integer_slot(position));
                }
                ArgumentBinding::Value {
                    accessor: natural_accessor(value),
                    storage,
                }
            }
            (_, MemoryLayout::Value(value)) => ArgumentBinding::Value {
                accessor: natural_accessor(value),
                storage: vec![integer_slot(position)],
            },
            (TypeClass::StructRegister, _) => ArgumentBinding::Struct {
                size: layout.byte_size(),
                chunks: vec![StructChunk {
                    offset: 0,
                    size: layout.byte_size(),
                    storage: integer_slot(position),
                    kind: ChunkKind::Raw {
                        left_justified: false,
                    },
                }],
            },
            _ => ArgumentBinding::StructReference {
                size: layout.byte_size(),
                alignment: layout.byte_alignment(),
                storage: integer_slot(position),
            },
        };
        arguments.push(binding);
        position += 1;
    }

    let stack_slots = position.saturating_sub(REGISTER_SLOTS) as u64;
    Ok(CallingSequence {
        abi: Abi::WindowsX64,
        descriptor: descriptor.clone(),
        options: *options,
        arguments,
        ret,
        stack_size: align_to(SHADOW_SPACE + stack_slots * STACK_SLOT_SIZE, 16),
        vector_count: None,
    })
}
