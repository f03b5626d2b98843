//! ELFv2 ABI for little-endian PPC64 Linux.
//!
//! Homogeneous floating point aggregates of up to eight members are passed
//! and returned in FPRs. Other aggregates of up to 16 bytes return in r3/r4,
//! and larger ones through a caller buffer whose address is passed in r3.

use crate::abi::{
    Abi, AbiError, CallingSequence, FunctionDescriptor, LinkerOptions, ReturnBinding,
    homogeneous_float_members, raw_chunks,
};
use crate::layout::MemoryLayout;

use super::{Flavor, R3, REGISTERS, arrange_with, float_chunk, scalar_return};

const FLAVOR: Flavor = Flavor {
    abi: Abi::SysVPpc64le,
    parameter_area_offset: 32,
    max_hfa_members: 8,
    left_justified: false,
};

const MAX_REGISTER_RETURN: u64 = 16;

fn arrange_return(layout: &MemoryLayout) -> ReturnBinding {
    let size = layout.byte_size();
    match layout {
        MemoryLayout::Value(value) => scalar_return(value),
        _ => {
            if let Some((carrier, offsets)) = homogeneous_float_members(layout, FLAVOR.max_hfa_members) {
                let chunks = offsets
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, offset)| REGISTERS.fpr(i).map(|s| float_chunk(carrier, offset, s)))
                    .collect();
                return ReturnBinding::Struct { size, chunks };
            }
            if size <= MAX_REGISTER_RETURN {
                return ReturnBinding::Struct {
                    size,
                    chunks: raw_chunks(size, (0..2).filter_map(|i| REGISTERS.gpr(i)), false),
                };
            }
            ReturnBinding::InMemory {
                size,
                alignment: layout.byte_alignment(),
                pointer: R3,
                returned_in: None,
            }
        }
    }
}

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let ret = match descriptor.return_layout() {
        Some(layout) => arrange_return(layout),
        None => ReturnBinding::Void,
    };
    arrange_with(FLAVOR, descriptor, options, ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Accessor, ArgumentBinding, ChunkKind, Storage};
    use crate::layout::ValueLayout;

    fn floats(n: usize) -> MemoryLayout {
        MemoryLayout::struct_layout(vec![MemoryLayout::from(ValueLayout::FLOAT); n]).unwrap()
    }

    #[test]
    fn test_float_consumes_doubleword() {
        let desc = FunctionDescriptor::of_void([
            ValueLayout::DOUBLE.into(),
            ValueLayout::INT.into(),
        ]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert_eq!(
            seq.arguments()[0],
            ArgumentBinding::Value {
                accessor: Accessor::Double,
                storage: vec![Storage::Fpr { index: 0, name: "f1" }],
            }
        );
        assert_eq!(
            seq.arguments()[1],
            ArgumentBinding::Value {
                accessor: Accessor::Long,
                storage: vec![Storage::Gpr { index: 1, name: "r4" }],
            }
        );
    }

    #[test]
    fn test_variadic_double_is_shadowed() {
        let desc = FunctionDescriptor::of_void([
            ValueLayout::ADDRESS.into(),
            ValueLayout::DOUBLE.into(),
        ]);
        let seq = arrange(&desc, &LinkerOptions::first_variadic_arg(1)).unwrap();
        assert_eq!(
            seq.arguments()[1],
            ArgumentBinding::Value {
                accessor: Accessor::Double,
                storage: vec![
                    Storage::Fpr { index: 0, name: "f1" },
                    Storage::Gpr { index: 1, name: "r4" },
                ],
            }
        );
    }

    #[test]
    fn test_hfa_argument_in_fprs() {
        let desc = FunctionDescriptor::of_void([floats(3), ValueLayout::LONG.into()]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[0] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Float));
        // 12 bytes occupy two doublewords.
        assert_eq!(
            seq.arguments()[1],
            ArgumentBinding::Value {
                accessor: Accessor::Long,
                storage: vec![Storage::Gpr { index: 2, name: "r5" }],
            }
        );
    }

    #[test]
    fn test_struct_returns() {
        let pair = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::LONG),
            MemoryLayout::from(ValueLayout::INT),
            MemoryLayout::from(ValueLayout::INT),
        ])
        .unwrap();
        assert!(matches!(arrange_return(&pair), ReturnBinding::Struct { ref chunks, .. } if chunks.len() == 2));
        assert!(matches!(arrange_return(&floats(8)), ReturnBinding::Struct { ref chunks, .. } if chunks[0].storage == super::super::F1));
        let big = MemoryLayout::struct_layout(vec![MemoryLayout::from(ValueLayout::LONG); 3]).unwrap();
        assert!(matches!(arrange_return(&big), ReturnBinding::InMemory { pointer: R3, .. }));
    }

    #[test]
    fn test_stack_parameters_after_eight_doublewords() {
        let desc = FunctionDescriptor::of_void(vec![ValueLayout::LONG.into(); 9]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert_eq!(
            seq.arguments()[8],
            ArgumentBinding::Value {
                accessor: Accessor::Long,
                storage: vec![Storage::Stack { offset: 32 + 64, size: 8 }],
            }
        );
        assert_eq!(seq.stack_size(), 112);
    }
}
