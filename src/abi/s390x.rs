//! s390x ELF ABI on Linux.
//!
//! Integers and pointers go in r2-r6, floating point values in f0, f2, f4
//! and f6, and everything else in the parameter area above the 160-byte
//! register save area. A struct whose only member is a `float` or `double`
//! is passed as that scalar. Other structs of 1, 2, 4 or 8 bytes are passed
//! as an integer of the same size; the rest go by reference. Aggregates are
//! always returned through a caller buffer addressed by r2.

use std::fmt;

use crate::abi::{
    Abi, AbiError, Accessor, ArgumentBinding, CallingSequence, ChunkKind, FunctionDescriptor,
    LinkerOptions, RegisterFile, ReturnBinding, Storage, StorageAllocator,
    StructChunk, raw_chunks,
};
use crate::layout::{Carrier, GroupLayout, MemoryLayout, ValueLayout};

pub const REGISTERS: RegisterFile = RegisterFile {
    gprs: &["r2", "r3", "r4", "r5", "r6"],
    fprs: &["f0", "f2", "f4", "f6"],
    arg_gprs: 5,
    arg_fprs: 4,
};

const R2: Storage = Storage::Gpr { index: 0, name: "r2" };
const F0: Storage = Storage::Fpr { index: 0, name: "f0" };

/// Register save area below the outgoing parameters.
const REGISTER_SAVE_AREA: u64 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Every integral carrier.
    Integer,
    /// `float` and `double`.
    Float,
    Pointer,
    Struct,
    /// A struct with exactly one member, which is a `float` or `double`.
    StructOneFloat,
}

impl TypeClass {
    /// Whether values of this class travel in the floating point registers.
    pub fn is_floating(self) -> bool {
        matches!(self, TypeClass::Float | TypeClass::StructOneFloat)
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeClass::Integer => "INTEGER",
            TypeClass::Float => "FLOAT",
            TypeClass::Pointer => "POINTER",
            TypeClass::Struct => "STRUCT",
            TypeClass::StructOneFloat => "STRUCT_ONE_FLOAT",
        })
    }
}

fn single_float_member(group: &GroupLayout) -> Option<Carrier> {
    match group.members() {
        [MemoryLayout::Value(value)] if value.carrier().is_floating() => Some(value.carrier()),
        _ => None,
    }
}

pub fn classify_layout(layout: &MemoryLayout) -> Result<TypeClass, AbiError> {
    match layout {
        MemoryLayout::Value(value) => Ok(match value.carrier() {
            Carrier::Float | Carrier::Double => TypeClass::Float,
            Carrier::Address => TypeClass::Pointer,
            _ => TypeClass::Integer,
        }),
        MemoryLayout::Group(group) if single_float_member(group).is_some() => Ok(TypeClass::StructOneFloat),
        MemoryLayout::Group(_) => Ok(TypeClass::Struct),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

/// Integers widen to a long and `float` to `double`.
pub fn classify_accessor(layout: &ValueLayout) -> Accessor {
    match layout.carrier() {
        Carrier::Float | Carrier::Double => Accessor::Double,
        Carrier::Address => Accessor::Address,
        _ => Accessor::Long,
    }
}

/// Accessor used when an aggregate of `layout` is read as a single slot.
/// Aggregates are always handled through their address.
pub fn classify_aggregate_accessor(layout: &MemoryLayout) -> Accessor {
    match layout {
        MemoryLayout::Value(value) => classify_accessor(value),
        _ => Accessor::Address,
    }
}

fn passes_as_integer(size: u64) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
}

fn arrange_argument(layout: &MemoryLayout, alloc: &mut StorageAllocator) -> Result<ArgumentBinding, AbiError> {
    let size = layout.byte_size();
    Ok(match (classify_layout(layout)?, layout) {
        (TypeClass::Float, MemoryLayout::Value(value)) => ArgumentBinding::Value {
            accessor: classify_accessor(value),
            storage: vec![alloc.fpr_or_stack()],
        },
        (_, MemoryLayout::Value(value)) => ArgumentBinding::Value {
            accessor: classify_accessor(value),
            storage: vec![alloc.gpr_or_stack()],
        },
        (TypeClass::StructOneFloat, MemoryLayout::Group(group)) => {
            let carrier = single_float_member(group).unwrap_or(Carrier::Double);
            ArgumentBinding::Struct {
                size,
                chunks: vec![StructChunk {
                    offset: 0,
                    size: carrier.byte_size(),
                    storage: alloc.fpr_or_stack(),
                    kind: if carrier == Carrier::Float {
                        ChunkKind::Float
                    } else {
                        ChunkKind::Double
                    },
                }],
            }
        }
        _ if passes_as_integer(size) => ArgumentBinding::Struct {
            size,
            chunks: raw_chunks(size, [alloc.gpr_or_stack()], false),
        },
        _ => ArgumentBinding::StructReference {
            size,
            alignment: layout.byte_alignment(),
            storage: alloc.gpr_or_stack(),
        },
    })
}

fn arrange_return(layout: &MemoryLayout) -> Result<ReturnBinding, AbiError> {
    Ok(match (classify_layout(layout)?, layout) {
        (TypeClass::Float, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: classify_accessor(value),
            storage: F0,
        },
        (_, MemoryLayout::Value(value)) => ReturnBinding::Value {
            accessor: classify_accessor(value),
            storage: R2,
        },
        _ => ReturnBinding::InMemory {
            size: layout.byte_size(),
            alignment: layout.byte_alignment(),
            pointer: R2,
            returned_in: None,
        },
    })
}

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let ret = match descriptor.return_layout() {
        Some(layout) => arrange_return(layout)?,
        None => ReturnBinding::Void,
    };
    let mut alloc = StorageAllocator::new(REGISTERS, REGISTER_SAVE_AREA);
    if matches!(ret, ReturnBinding::InMemory { .. }) {
        alloc.gpr();
    }
    let arguments = descriptor
        .argument_layouts()
        .iter()
        .map(|layout| arrange_argument(layout, &mut alloc))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallingSequence {
        abi: Abi::SysVS390x,
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

    fn one(member: ValueLayout) -> MemoryLayout {
        MemoryLayout::struct_layout([MemoryLayout::from(member)]).unwrap()
    }

    #[test]
    fn test_single_float_struct_classification() {
        assert_eq!(classify_layout(&one(ValueLayout::DOUBLE)).unwrap(), TypeClass::StructOneFloat);
        assert_eq!(classify_layout(&one(ValueLayout::FLOAT)).unwrap(), TypeClass::StructOneFloat);
        let two = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::DOUBLE),
            MemoryLayout::from(ValueLayout::DOUBLE),
        ])
        .unwrap();
        assert_eq!(classify_layout(&two).unwrap(), TypeClass::Struct);
        assert_eq!(classify_layout(&one(ValueLayout::INT)).unwrap(), TypeClass::Struct);
        assert_eq!(classify_layout(&ValueLayout::FLOAT.into()).unwrap(), TypeClass::Float);
        assert_eq!(classify_layout(&ValueLayout::DOUBLE.into()).unwrap(), TypeClass::Float);
        assert!(TypeClass::StructOneFloat.is_floating());
        assert!(!TypeClass::Struct.is_floating());
    }

    #[test]
    fn test_nested_single_float_is_plain_struct() {
        let nested = MemoryLayout::struct_layout([one(ValueLayout::DOUBLE)]).unwrap();
        assert_eq!(classify_layout(&nested).unwrap(), TypeClass::Struct);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(classify_accessor(&ValueLayout::SHORT), Accessor::Long);
        assert_eq!(classify_accessor(&ValueLayout::FLOAT), Accessor::Double);
        assert_eq!(classify_aggregate_accessor(&one(ValueLayout::FLOAT)), Accessor::Address);
        assert_eq!(classify_aggregate_accessor(&ValueLayout::ADDRESS.into()), Accessor::Address);
    }

    #[test]
    fn test_single_float_struct_uses_fpr() {
        let desc = FunctionDescriptor::of_void([
            ValueLayout::INT.into(),
            one(ValueLayout::DOUBLE),
            one(ValueLayout::INT),
        ]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[1] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks[0].storage, F0);
        assert_eq!(chunks[0].kind, ChunkKind::Double);
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[2] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks[0].storage.to_string(), "r3");
    }

    #[test]
    fn test_odd_sized_struct_by_reference() {
        let three = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::SHORT),
            MemoryLayout::from(ValueLayout::BYTE),
        ])
        .unwrap();
        let desc = FunctionDescriptor::of(three.clone(), [three]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert!(matches!(seq.return_binding(), ReturnBinding::InMemory { pointer: R2, .. }));
        assert!(matches!(
            seq.arguments()[0],
            ArgumentBinding::StructReference {
                storage: Storage::Gpr { name: "r3", .. },
                ..
            }
        ));
    }

    #[test]
    fn test_stack_starts_after_save_area() {
        let desc = FunctionDescriptor::of_void(vec![ValueLayout::LONG.into(); 6]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert_eq!(
            seq.arguments()[5],
            ArgumentBinding::Value {
                accessor: Accessor::Long,
                storage: vec![Storage::Stack { offset: 160, size: 8 }],
            }
        );
        assert_eq!(seq.stack_size(), 176);
    }
}
