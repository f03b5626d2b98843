//! System V AMD64 ABI (Linux, macOS).
//!
//! Aggregates of up to 16 bytes are split into eightbytes, each classified
//! INTEGER or SSE from the scalar fields that overlap it. Larger aggregates
//! are MEMORY and are copied onto the stack. When an aggregate's eightbytes
//! do not all fit in the remaining registers it goes to the stack whole.

use std::fmt;

use crate::abi::{
    ArgumentBinding, CallingSequence, ChunkKind, FunctionDescriptor, LinkerOptions, RegisterFile,
    ReturnBinding, Storage, StorageAllocator, StructChunk, natural_accessor, stack_chunk,
};
use crate::abi::AbiError;
use crate::layout::{Carrier, MemoryLayout};

pub const REGISTERS: RegisterFile = RegisterFile {
    gprs: &["rdi", "rsi", "rdx", "rcx", "r8", "r9", "rax"],
    fprs: &["xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7"],
    arg_gprs: 6,
    arg_fprs: 8,
};

const RAX: Storage = Storage::Gpr { index: 6, name: "rax" };
const RDX: Storage = Storage::Gpr { index: 2, name: "rdx" };
const XMM0: Storage = Storage::Fpr { index: 0, name: "xmm0" };
const XMM1: Storage = Storage::Fpr { index: 1, name: "xmm1" };

const MAX_REGISTER_AGGREGATE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Integer,
    Float,
    Pointer,
    /// Aggregate passed in registers, eightbyte by eightbyte.
    StructRegister,
    /// Aggregate passed in memory.
    StructMemory,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeClass::Integer => "INTEGER",
            TypeClass::Float => "FLOAT",
            TypeClass::Pointer => "POINTER",
            TypeClass::StructRegister => "STRUCT_REGISTER",
            TypeClass::StructMemory => "STRUCT_MEMORY",
        })
    }
}

/// Class of one eightbyte of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EightbyteClass {
    Integer,
    Sse,
}

pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, AbiError> {
    match layout {
        MemoryLayout::Value(value) => Ok(match value.carrier() {
            Carrier::Float | Carrier::Double => TypeClass::Float,
            Carrier::Address => TypeClass::Pointer,
            _ => TypeClass::Integer,
        }),
        MemoryLayout::Group(_) => Ok(match eightbyte_classes(layout) {
            Some(_) => TypeClass::StructRegister,
            None => TypeClass::StructMemory,
        }),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

/// Eightbyte classes of an aggregate, or `None` when it is passed in memory.
///
/// INTEGER wins over SSE when both kinds of field share an eightbyte.
/// Eightbytes holding only padding are passed as INTEGER.
pub fn eightbyte_classes(layout: &MemoryLayout) -> Option<Vec<EightbyteClass>> {
    let size = layout.byte_size();
    if size > MAX_REGISTER_AGGREGATE {
        return None;
    }
    let count = size.div_ceil(8) as usize;
    let mut classes: Vec<Option<EightbyteClass>> = vec![None; count];
    for (offset, field) in layout.scalar_fields() {
        if offset % 8 + field.byte_size() > 8 {
            return None;
        }
        let class = if field.carrier().is_floating() {
            EightbyteClass::Sse
        } else {
            EightbyteClass::Integer
        };
        let slot = classes.get_mut((offset / 8) as usize)?;
        *slot = match (*slot, class) {
            (Some(EightbyteClass::Integer), _) | (_, EightbyteClass::Integer) => {
                Some(EightbyteClass::Integer)
            }
            _ => Some(EightbyteClass::Sse),
        };
    }
    Some(
        classes
            .into_iter()
            .map(|c| c.unwrap_or(EightbyteClass::Integer))
            .collect(),
    )
}

fn chunk(layout: &MemoryLayout, index: usize, storage: Storage) -> StructChunk {
    let offset = index as u64 * 8;
    StructChunk {
        offset,
        size: layout.byte_size().saturating_sub(offset).min(8),
        storage,
        kind: ChunkKind::Raw {
            left_justified: false,
        },
    }
}

fn arrange_return(layout: &MemoryLayout, alloc: &mut StorageAllocator) -> Result<ReturnBinding, AbiError> {
    Ok(match (classify_layout(layout)?, layout) {
        (TypeClass::Integer | TypeClass::Pointer, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: natural_accessor(value),
            storage: RAX,
        },
        (TypeClass::Float, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: natural_accessor(value),
            storage: XMM0,
        },
        (TypeClass::StructRegister, _) => {
            let classes = eightbyte_classes(layout).unwrap_or_default();
            let mut ints = [RAX, RDX].into_iter();
            let mut sses = [XMM0, XMM1].into_iter();
            let mut chunks = Vec::with_capacity(classes.len());
            for (i, class) in classes.iter().enumerate() {
                let storage = match class {
                    EightbyteClass::Integer => ints.next(),
                    EightbyteClass::Sse => sses.next(),
                };
                let storage = storage.ok_or_else(|| AbiError::UnsupportedLayout(layout.to_string()))?;
                chunks.push(chunk(layout, i, storage));
            }
            ReturnBinding::Struct {
                size: layout.byte_size(),
                chunks,
            }
        }
        _ => {
            let pointer = alloc
                .gpr()
                .ok_or_else(|| AbiError::UnsupportedLayout(layout.to_string()))?;
            ReturnBinding::InMemory {
                size: layout.byte_size(),
                alignment: layout.byte_alignment(),
                pointer,
                returned_in: Some(RAX),
            }
        }
    })
}

fn arrange_struct(layout: &MemoryLayout, alloc: &mut StorageAllocator) -> ArgumentBinding {
    let size = layout.byte_size();
    if let Some(classes) = eightbyte_classes(layout) {
        let ints = classes.iter().filter(|c| **c == EightbyteClass::Integer).count();
        let sses = classes.len() - ints;
        if alloc.gprs_left() >= ints && alloc.fprs_left() >= sses {
            let chunks = classes
                .iter()
                .enumerate()
                .filter_map(|(i, class)| {
                    let storage = match class {
                        EightbyteClass::Integer => alloc.gpr(),
                        EightbyteClass::Sse => alloc.fpr(),
                    };
                    storage.map(|s| chunk(layout, i, s))
                })
                .collect();
            return ArgumentBinding::Struct { size, chunks };
        }
    }
    let storage = alloc.stack(size, layout.byte_alignment());
    ArgumentBinding::Struct {
        size,
        chunks: vec![stack_chunk(layout, storage)],
    }
}

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let mut alloc = StorageAllocator::new(REGISTERS, 0);
    let ret = match descriptor.return_layout() {
        Some(layout) => arrange_return(layout, &mut alloc)?,
        None => ReturnBinding::Void,
    };
    let mut arguments = Vec::with_capacity(descriptor.argument_layouts().len());
    for layout in descriptor.argument_layouts() {
        let binding = match (classify_layout(layout)?, layout) {
            (TypeClass::Integer | TypeClass::Pointer, MemoryLayout::Value(value)) => ArgumentBinding::Value {
                accessor: natural_accessor(value),
                storage: vec![alloc.gpr_or_stack()],
            },
            (TypeClass::Float, MemoryLayout::Value(value)) => ArgumentBinding::Value {
                accessor: natural_accessor(value),
                storage: vec![alloc.fpr_or_stack()],
            },
            _ => arrange_struct(layout, &mut alloc),
        };
        arguments.push(binding);
    }
    let vector_count = options
        .is_variadic()
        .then(|| u8::try_from(alloc.fprs_used()).unwrap_or(u8::MAX));
    Ok(CallingSequence {
        abi: crate::abi::Abi::SysVX64,
        descriptor: descriptor.clone(),
        options: *options,
        arguments,
        ret,
        stack_size: alloc.stack_size(),
        vector_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ValueLayout;

    fn s(members: &[ValueLayout]) -> MemoryLayout {
        MemoryLayout::struct_layout(members.iter().cloned().map(MemoryLayout::from)).unwrap()
    }

    #[test]
    fn test_eightbyte_classes() {
        let mixed = s(&[ValueLayout::FLOAT, ValueLayout::INT, ValueLayout::DOUBLE]);
        assert_eq!(
            eightbyte_classes(&mixed).unwrap(),
            vec![EightbyteClass::Integer, EightbyteClass::Sse]
        );
        let big = s(&[ValueLayout::LONG, ValueLayout::LONG, ValueLayout::LONG]);
        assert_eq!(eightbyte_classes(&big), None);
        assert_eq!(classify_layout(&big).unwrap(), TypeClass::StructMemory);
    }

    #[test]
    fn test_integer_registers_then_stack() {
        let desc = FunctionDescriptor::of_void(vec![ValueLayout::INT.into(); 7]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert_eq!(
            seq.arguments()[5],
            ArgumentBinding::Value {
                accessor: crate::abi::Accessor::Long,
                storage: vec![Storage::Gpr { index: 5, name: "r9" }],
            }
        );
        assert_eq!(
            seq.arguments()[6],
            ArgumentBinding::Value {
                accessor: crate::abi::Accessor::Long,
                storage: vec![Storage::Stack { offset: 0, size: 8 }],
            }
        );
        assert_eq!(seq.stack_size(), 16);
    }

    #[test]
    fn test_struct_split_across_register_files() {
        let desc = FunctionDescriptor::of_void([s(&[ValueLayout::LONG, ValueLayout::DOUBLE])]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[0] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks[0].storage, Storage::Gpr { index: 0, name: "rdi" });
        assert_eq!(chunks[1].storage, Storage::Fpr { index: 0, name: "xmm0" });
    }

    #[test]
    fn test_memory_return_uses_hidden_pointer() {
        let big = s(&[ValueLayout::LONG, ValueLayout::LONG, ValueLayout::LONG]);
        let desc = FunctionDescriptor::of(big, [ValueLayout::INT.into()]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert!(matches!(
            seq.return_binding(),
            ReturnBinding::InMemory {
                pointer: Storage::Gpr { index: 0, .. },
                returned_in: Some(RAX),
                ..
            }
        ));
        assert_eq!(
            seq.arguments()[0],
            ArgumentBinding::Value {
                accessor: crate::abi::Accessor::Long,
                storage: vec![Storage::Gpr { index: 1, name: "rsi" }],
            }
        );
    }

    #[test]
    fn test_variadic_sets_vector_count() {
        let desc = FunctionDescriptor::of_void([
            ValueLayout::ADDRESS.into(),
            ValueLayout::DOUBLE.into(),
            ValueLayout::DOUBLE.into(),
        ]);
        let seq = arrange(&desc, &LinkerOptions::first_variadic_arg(1)).unwrap();
        assert_eq!(seq.vector_count(), Some(2));
    }

    #[test]
    fn test_struct_goes_to_stack_when_registers_run_out() {
        let mut args: Vec<MemoryLayout> = vec![ValueLayout::LONG.into(); 5];
        args.push(s(&[ValueLayout::LONG, ValueLayout::LONG]));
        let seq = arrange(&FunctionDescriptor::of_void(args), &LinkerOptions::default()).unwrap();
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[5] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].storage, Storage::Stack { offset: 0, size: 16 });
    }
}
