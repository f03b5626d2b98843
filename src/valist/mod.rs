//! Native `va_list` buffers.
//!
//! On the supported ABIs a `va_list` is a plain pointer into a buffer of
//! 8-byte slots. Scalars take one slot, promoted to `long`, `double` or
//! address width. Structs are copied into the buffer and take their size
//! rounded up to a whole number of slots, except on Windows x64 where a
//! struct that is not 1, 2, 4 or 8 bytes long is stored as a pointer to a
//! copy.
//!
//! A [`VaList`] is a cursor: every read advances it past the slot it
//! consumed, and reading past the end of the buffer is an error.

mod error;

pub use error::VaListError;

use std::fmt;

use crate::abi::{Abi, Accessor, Classification, STACK_SLOT_SIZE, ppc64, x64};
use crate::layout::{Carrier, MemoryLayout, ValueLayout};
use crate::memory::{Arena, MemorySegment, Value, align_to};

fn check_abi(abi: Abi) -> Result<(), VaListError> {
    match abi {
        Abi::AixPpc64 | Abi::SysVPpc64le | Abi::WindowsX64 => Ok(()),
        other => Err(VaListError::UnsupportedAbi(other)),
    }
}

/// How an argument is stored in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    /// One promoted slot, or a small struct that fits one.
    Single,
    /// Struct contents, rounded up to whole slots.
    Inline,
    /// Pointer to a copy of the struct.
    Reference,
}

fn slot_kind(abi: Abi, layout: &MemoryLayout) -> Result<SlotKind, VaListError> {
    check_abi(abi)?;
    Ok(match abi.classify(layout)? {
        Classification::Ppc64(ppc64::TypeClass::Struct) => SlotKind::Inline,
        Classification::WindowsX64(x64::windows::TypeClass::StructReference) => SlotKind::Reference,
        _ => SlotKind::Single,
    })
}

/// Bytes of buffer an argument of `layout` occupies.
pub fn slot_size(abi: Abi, layout: &MemoryLayout) -> Result<u64, VaListError> {
    Ok(match slot_kind(abi, layout)? {
        SlotKind::Inline => align_to(layout.byte_size(), STACK_SLOT_SIZE),
        SlotKind::Single | SlotKind::Reference => STACK_SLOT_SIZE,
    })
}

/// Promoted slot layout for a scalar: floats widen to double, integers
/// to long.
fn slot_layout(abi: Abi, layout: &ValueLayout) -> ValueLayout {
    let order = abi.byte_order();
    match abi.classify_accessor(layout) {
        Accessor::Float | Accessor::Double => ValueLayout::DOUBLE.with_order(order),
        Accessor::Address => ValueLayout::ADDRESS.with_order(order),
        Accessor::Long => ValueLayout::LONG.with_order(order),
    }
}

/// The slot layout and promoted value for a scalar argument.
fn promote(abi: Abi, layout: &ValueLayout, value: &Value) -> Option<(ValueLayout, Value)> {
    let slot = slot_layout(abi, layout);
    let promoted = match slot.carrier() {
        Carrier::Double => Value::Double(value.as_f64()?),
        Carrier::Address => Value::Address(value.as_address()?),
        _ => Value::Long(value.as_i64()?),
    };
    Some((slot, promoted))
}

fn expect_carrier(layout: &ValueLayout, carrier: Carrier) -> Result<(), VaListError> {
    if layout.carrier() == carrier {
        Ok(())
    } else {
        Err(VaListError::CarrierMismatch {
            expected: carrier.name(),
            layout: layout.to_string(),
        })
    }
}

/// A cursor over a native variadic argument buffer.
///
/// Not thread-safe: a list is advanced in place and must have a single owner.
#[derive(Debug, Clone)]
pub struct VaList {
    abi: Abi,
    /// `None` for the empty list.
    cursor: Option<MemorySegment>,
}

impl VaList {
    /// The list with no arguments. Every read fails.
    pub fn empty(abi: Abi) -> Result<Self, VaListError> {
        check_abi(abi)?;
        Ok(Self { abi, cursor: None })
    }

    pub fn builder(abi: Abi, arena: &Arena) -> Result<VaListBuilder<'_>, VaListError> {
        check_abi(abi)?;
        arena.scope().check_alive()?;
        Ok(VaListBuilder {
            abi,
            arena,
            args: Vec::new(),
        })
    }

    /// Wrap a `va_list` received from native code. The buffer extent is
    /// unknown, so only the address space bounds reads.
    pub fn of_address(abi: Abi, address: u64, arena: &Arena) -> Result<Self, VaListError> {
        check_abi(abi)?;
        let segment = arena
            .memory()
            .segment(address, u64::MAX - address, arena.scope().clone())?;
        Ok(Self {
            abi,
            cursor: Some(segment),
        })
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// Native address of the next argument, 0 for the empty list.
    pub fn address(&self) -> u64 {
        self.cursor.as_ref().map(MemorySegment::address).unwrap_or_default()
    }

    /// A zero-length view at the cursor.
    pub fn segment(&self) -> Option<MemorySegment> {
        self.cursor.as_ref().map(|c| c.reinterpret(0))
    }

    /// An independent cursor at the same position.
    pub fn copy(&self) -> Result<Self, VaListError> {
        if let Some(cursor) = &self.cursor {
            cursor.scope().check_alive()?;
        }
        Ok(self.clone())
    }

    /// Bytes left before the end of a built buffer.
    pub fn remaining(&self) -> u64 {
        self.cursor.as_ref().map(MemorySegment::byte_size).unwrap_or_default()
    }

    fn next_slot(&self, layout: &MemoryLayout) -> Result<(MemorySegment, u64), VaListError> {
        let size = slot_size(self.abi, layout)?;
        let cursor = self.cursor.as_ref().ok_or(VaListError::Empty)?;
        cursor.scope().check_alive()?;
        if size > cursor.byte_size() {
            return Err(VaListError::Exhausted {
                layout: layout.to_string(),
            });
        }
        Ok((cursor.clone(), size))
    }

    fn advance(&mut self, size: u64) -> Result<(), VaListError> {
        if let Some(cursor) = &self.cursor {
            let rest = cursor.byte_size() - size.min(cursor.byte_size());
            self.cursor = Some(cursor.as_slice(size, rest)?);
        }
        Ok(())
    }

    /// Read the next scalar argument in its promoted slot form: a long,
    /// double or address value.
    pub fn next_value(&mut self, layout: &ValueLayout) -> Result<Value, VaListError> {
        let (slot, size) = self.next_slot(&layout.clone().into())?;
        let raw = slot.get(&slot_layout(self.abi, layout), 0)?;
        self.advance(size)?;
        Ok(raw)
    }

    pub fn next_int(&mut self, layout: &ValueLayout) -> Result<i32, VaListError> {
        expect_carrier(layout, Carrier::Int)?;
        let raw = self.next_value(layout)?.as_i64().unwrap_or_default();
        i32::try_from(raw).map_err(|_| VaListError::IntOverflow(raw))
    }

    pub fn next_long(&mut self, layout: &ValueLayout) -> Result<i64, VaListError> {
        expect_carrier(layout, Carrier::Long)?;
        Ok(self.next_value(layout)?.as_i64().unwrap_or_default())
    }

    pub fn next_double(&mut self, layout: &ValueLayout) -> Result<f64, VaListError> {
        expect_carrier(layout, Carrier::Double)?;
        Ok(self.next_value(layout)?.as_f64().unwrap_or_default())
    }

    pub fn next_address(&mut self, layout: &ValueLayout) -> Result<u64, VaListError> {
        expect_carrier(layout, Carrier::Address)?;
        Ok(self.next_value(layout)?.as_address().unwrap_or_default())
    }

    /// Copy the next struct argument into a new segment from `arena`.
    pub fn next_struct(&mut self, layout: &MemoryLayout, arena: &Arena) -> Result<MemorySegment, VaListError> {
        if layout.as_group().is_none() {
            return Err(VaListError::CarrierMismatch {
                expected: "struct",
                layout: layout.to_string(),
            });
        }
        let (slot, size) = self.next_slot(layout)?;
        let target = arena.allocate_layout(layout)?;
        let source = if slot_kind(self.abi, layout)? == SlotKind::Reference {
            let pointer = slot.get(&slot_layout(self.abi, &ValueLayout::ADDRESS), 0)?;
            let address = pointer.as_address().unwrap_or_default();
            arena.memory().unbounded(address)?
        } else {
            slot
        };
        let len = target.byte_size().min(layout.byte_size());
        target.write_bytes(0, &source.read_bytes(0, len)?)?;
        self.advance(size)?;
        Ok(target)
    }

    /// Advance past one argument of each layout without reading them.
    ///
    /// Either every layout fits and the cursor moves past all of them, or
    /// the cursor stays where it was.
    pub fn skip(&mut self, layouts: &[MemoryLayout]) -> Result<(), VaListError> {
        let mut cursor = self.clone();
        for layout in layouts {
            let (_, size) = cursor.next_slot(layout)?;
            cursor.advance(size)?;
        }
        *self = cursor;
        Ok(())
    }
}

impl fmt::Display for VaList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segment() {
            Some(segment) => write!(f, "VaList{{{}}}", segment),
            None => write!(f, "VaList{{MemorySegment{{ address: 0x0, byteSize: 0 }}}}"),
        }
    }
}

enum VaArg {
    Scalar(ValueLayout, Value),
    Struct(MemoryLayout, MemorySegment),
}

impl VaArg {
    fn layout(&self) -> MemoryLayout {
        match self {
            VaArg::Scalar(layout, _) => layout.clone().into(),
            VaArg::Struct(layout, _) => layout.clone(),
        }
    }
}

/// Accumulates arguments, then writes them into one buffer.
pub struct VaListBuilder<'a> {
    abi: Abi,
    arena: &'a Arena,
    args: Vec<VaArg>,
}

impl<'a> VaListBuilder<'a> {
    fn scalar(mut self, layout: &ValueLayout, carrier: Carrier, value: Value) -> Result<Self, VaListError> {
        expect_carrier(layout, carrier)?;
        self.args.push(VaArg::Scalar(layout.clone(), value));
        Ok(self)
    }

    pub fn add_int(self, layout: &ValueLayout, value: i32) -> Result<Self, VaListError> {
        self.scalar(layout, Carrier::Int, Value::Int(value))
    }

    pub fn add_long(self, layout: &ValueLayout, value: i64) -> Result<Self, VaListError> {
        self.scalar(layout, Carrier::Long, Value::Long(value))
    }

    pub fn add_double(self, layout: &ValueLayout, value: f64) -> Result<Self, VaListError> {
        self.scalar(layout, Carrier::Double, Value::Double(value))
    }

    pub fn add_address(self, layout: &ValueLayout, value: u64) -> Result<Self, VaListError> {
        self.scalar(layout, Carrier::Address, Value::Address(value))
    }

    /// Add a struct argument whose contents are in `value`.
    pub fn add_struct(mut self, layout: &MemoryLayout, value: &MemorySegment) -> Result<Self, VaListError> {
        if layout.as_group().is_none() {
            return Err(VaListError::CarrierMismatch {
                expected: "struct",
                layout: layout.to_string(),
            });
        }
        self.args.push(VaArg::Struct(layout.clone(), value.clone()));
        Ok(self)
    }

    /// Total buffer size the arguments added so far need.
    pub fn buffer_size(&self) -> Result<u64, VaListError> {
        self.args
            .iter()
            .try_fold(0u64, |total, arg| Ok(total + slot_size(self.abi, &arg.layout())?))
    }

    pub fn build(self) -> Result<VaList, VaListError> {
        if self.args.is_empty() {
            return VaList::empty(self.abi);
        }
        let buffer = self.arena.allocate(self.buffer_size()?, STACK_SLOT_SIZE)?;
        let mut offset = 0;
        for arg in &self.args {
            let layout = arg.layout();
            let kind = slot_kind(self.abi, &layout)?;
            match arg {
                VaArg::Scalar(value_layout, value) => {
                    let (slot, promoted) = promote(self.abi, value_layout, value).ok_or_else(|| VaListError::CarrierMismatch {
                        expected: value_layout.carrier().name(),
                        layout: value.to_string(),
                    })?;
                    buffer.set(&slot, offset, promoted)?;
                }
                VaArg::Struct(struct_layout, contents) if kind == SlotKind::Reference => {
                    let copy = self.arena.allocate_layout(struct_layout)?;
                    let len = contents.byte_size().min(struct_layout.byte_size());
                    copy.write_bytes(0, &contents.read_bytes(0, len)?)?;
                    let slot = slot_layout(self.abi, &ValueLayout::ADDRESS);
                    buffer.set(&slot, offset, Value::Address(copy.address()))?;
                }
                VaArg::Struct(struct_layout, contents) => {
                    let len = contents.byte_size().min(struct_layout.byte_size());
                    buffer.write_bytes(offset, &contents.read_bytes(0, len)?)?;
                }
            }
            offset += slot_size(self.abi, &layout)?;
        }
        Ok(VaList {
            abi: self.abi,
            cursor: Some(buffer),
        })
    }
}
