//! AIX PPC64 ABI.
//!
//! Big-endian, with no special handling of floating point aggregates:
//! every aggregate is passed as its memory image, left-justified in GPRs,
//! and every aggregate is returned through a caller buffer addressed by r3.

use crate::abi::{Abi, AbiError, CallingSequence, FunctionDescriptor, LinkerOptions, ReturnBinding};
use crate::layout::MemoryLayout;

use super::{Flavor, R3, arrange_with, scalar_return};

const FLAVOR: Flavor = Flavor {
    abi: Abi::AixPpc64,
    parameter_area_offset: 48,
    max_hfa_members: 0,
    left_justified: true,
};

pub(crate) fn arrange(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<CallingSequence, AbiError> {
    let ret = match descriptor.return_layout() {
        None => ReturnBinding::Void,
        Some(MemoryLayout::Value(value)) => scalar_return(value),
        Some(layout) => ReturnBinding::InMemory {
            size: layout.byte_size(),
            alignment: layout.byte_alignment(),
            pointer: R3,
            returned_in: None,
        },
    };
    arrange_with(FLAVOR, descriptor, options, ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Accessor, ArgumentBinding, ChunkKind, Storage};
    use crate::layout::ValueLayout;

    #[test]
    fn test_small_struct_is_left_justified() {
        let small = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::SHORT),
            MemoryLayout::from(ValueLayout::BYTE),
        ])
        .unwrap();
        let desc = FunctionDescriptor::of_void([small]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[0] else {
            panic!("expected struct binding");
        };
        assert_eq!(chunks[0].kind, ChunkKind::Raw { left_justified: true });
        assert_eq!(chunks[0].size, 3);
    }

    #[test]
    fn test_float_struct_is_not_an_hfa() {
        let pair = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::DOUBLE),
            MemoryLayout::from(ValueLayout::DOUBLE),
        ])
        .unwrap();
        let desc = FunctionDescriptor::of(pair.clone(), [pair]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert!(matches!(seq.return_binding(), ReturnBinding::InMemory { pointer: R3, .. }));
        let ArgumentBinding::Struct { chunks, .. } = &seq.arguments()[0] else {
            panic!("expected struct binding");
        };
        let names: Vec<String> = chunks.iter().map(|c| c.storage.to_string()).collect();
        assert_eq!(names, vec!["r4", "r5"]);
    }

    #[test]
    fn test_float_promotes_to_double() {
        let desc = FunctionDescriptor::of(ValueLayout::FLOAT.into(), [ValueLayout::FLOAT.into()]);
        let seq = arrange(&desc, &LinkerOptions::default()).unwrap();
        assert_eq!(
            seq.arguments()[0],
            ArgumentBinding::Value {
                accessor: Accessor::Double,
                storage: vec![Storage::Fpr { index: 0, name: "f1" }],
            }
        );
        assert!(matches!(
            seq.return_binding(),
            ReturnBinding::Value { accessor: Accessor::Double, .. }
        ));
    }
}
