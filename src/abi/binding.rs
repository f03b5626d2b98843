//! Binding plans: where every argument and the return value live.

use std::fmt;

use serde::Serialize;

use crate::layout::{Carrier, MemoryLayout, ValueLayout};
use crate::memory::align_to;

use super::{Abi, AbiError, FunctionDescriptor, LinkerOptions};

/// Size of one stack slot on every supported ABI.
pub const STACK_SLOT_SIZE: u64 = 8;

/// A register or a stack location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Storage {
    /// General purpose register; `index` is a position in the ABI's
    /// [`RegisterFile::gprs`].
    Gpr { index: usize, name: &'static str },
    /// Floating point or vector register.
    Fpr { index: usize, name: &'static str },
    /// `size` bytes at `offset` in the outgoing stack area.
    Stack { offset: u64, size: u64 },
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Gpr { name, .. } | Storage::Fpr { name, .. } => f.write_str(name),
            Storage::Stack { offset, size } => write!(f, "stack[{}..{}]", offset, offset + size),
        }
    }
}

/// Width and kind of a scalar once it has been widened for a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accessor {
    /// Integer carriers, sign- or zero-extended to 64 bits.
    Long,
    /// Single precision in the low 32 bits.
    Float,
    Double,
    Address,
}

/// How the bytes of one struct chunk are placed in its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkKind {
    /// The memory image of the chunk. `left_justified` chunks start at the
    /// most significant byte of a big-endian register.
    Raw { left_justified: bool },
    /// A `float` member, widened to double precision in the register.
    Float,
    /// A `double` member.
    Double,
}

/// A contiguous byte range of a struct and where it is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StructChunk {
    pub offset: u64,
    pub size: u64,
    pub storage: Storage,
    pub kind: ChunkKind,
}

/// How one argument is passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentBinding {
    /// A scalar. Variadic floating point values on some ABIs are passed in
    /// more than one location, so `storage` may hold shadow copies after the
    /// first entry.
    Value {
        accessor: Accessor,
        storage: Vec<Storage>,
    },
    /// A struct passed by value, split into chunks.
    Struct { size: u64, chunks: Vec<StructChunk> },
    /// A struct copied to caller-owned memory and passed as a pointer.
    StructReference {
        size: u64,
        alignment: u64,
        storage: Storage,
    },
}

/// How the return value comes back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnBinding {
    Void,
    Value { accessor: Accessor, storage: Storage },
    Struct { size: u64, chunks: Vec<StructChunk> },
    /// The caller allocates a buffer and passes its address in `pointer`.
    /// Some ABIs hand the same address back in `returned_in`.
    InMemory {
        size: u64,
        alignment: u64,
        pointer: Storage,
        returned_in: Option<Storage>,
    },
}

/// The full binding plan for one signature on one ABI.
///
/// Plans are immutable once arranged and may be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct CallingSequence {
    pub(crate) abi: Abi,
    pub(crate) descriptor: FunctionDescriptor,
    pub(crate) options: LinkerOptions,
    pub(crate) arguments: Vec<ArgumentBinding>,
    pub(crate) ret: ReturnBinding,
    pub(crate) stack_size: u64,
    pub(crate) vector_count: Option<u8>,
}

impl CallingSequence {
    pub fn abi(&self) -> Abi {
        self.abi
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &LinkerOptions {
        &self.options
    }

    pub fn arguments(&self) -> &[ArgumentBinding] {
        &self.arguments
    }

    pub fn return_binding(&self) -> &ReturnBinding {
        &self.ret
    }

    /// Bytes of outgoing stack area, including any fixed save area.
    pub fn stack_size(&self) -> u64 {
        self.stack_size
    }

    /// Number of vector registers used, for ABIs that pass it to variadic
    /// callees (`al` on SysV x86-64).
    pub fn vector_count(&self) -> Option<u8> {
        self.vector_count
    }

    pub fn needs_return_buffer(&self) -> bool {
        matches!(self.ret, ReturnBinding::InMemory { .. })
    }
}

impl fmt::Display for CallingSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.abi, self.descriptor)?;
        for (i, (binding, layout)) in self
            .arguments
            .iter()
            .zip(self.descriptor.argument_layouts())
            .enumerate()
        {
            write!(f, "  arg{} {}: ", i, layout)?;
            fmt_argument(f, binding)?;
            writeln!(f)?;
        }
        write!(f, "  ret: ")?;
        match &self.ret {
            ReturnBinding::Void => write!(f, "void")?,
            ReturnBinding::Value { accessor, storage } => write!(f, "{:?} in {}", accessor, storage)?,
            ReturnBinding::Struct { chunks, .. } => fmt_chunks(f, chunks)?,
            ReturnBinding::InMemory {
                pointer,
                returned_in,
                ..
            } => {
                write!(f, "buffer pointer in {}", pointer)?;
                if let Some(returned) = returned_in {
                    write!(f, ", returned in {}", returned)?;
                }
            }
        }
        writeln!(f)?;
        write!(f, "  stack: {} bytes", self.stack_size)?;
        if let Some(count) = self.vector_count {
            write!(f, ", vector registers: {}", count)?;
        }
        Ok(())
    }
}

fn fmt_argument(f: &mut fmt::Formatter<'_>, binding: &ArgumentBinding) -> fmt::Result {
    match binding {
        ArgumentBinding::Value { accessor, storage } => {
            write!(f, "{:?} in ", accessor)?;
            for (i, s) in storage.iter().enumerate() {
                if i > 0 {
                    write!(f, " + ")?;
                }
                write!(f, "{}", s)?;
            }
            Ok(())
        }
        ArgumentBinding::Struct { chunks, .. } => fmt_chunks(f, chunks),
        ArgumentBinding::StructReference { storage, .. } => write!(f, "pointer to copy in {}", storage),
    }
}

fn fmt_chunks(f: &mut fmt::Formatter<'_>, chunks: &[StructChunk]) -> fmt::Result {
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "[{}..{}] in {}", chunk.offset, chunk.offset + chunk.size, chunk.storage)?;
    }
    Ok(())
}

/// Register names of an ABI. The first `arg_gprs`/`arg_fprs` entries carry
/// arguments; any further entries are only used for return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    pub gprs: &'static [&'static str],
    pub fprs: &'static [&'static str],
    pub arg_gprs: usize,
    pub arg_fprs: usize,
}

impl RegisterFile {
    /// Storage for GPR `index`, or `None` past the end of the file.
    pub fn gpr(&self, index: usize) -> Option<Storage> {
        self.gprs
            .get(index)
            .map(|name| Storage::Gpr { index, name })
    }

    pub fn fpr(&self, index: usize) -> Option<Storage> {
        self.fprs
            .get(index)
            .map(|name| Storage::Fpr { index, name })
    }

    /// Storage for the GPR called `name`.
    pub fn named_gpr(&self, name: &str) -> Option<Storage> {
        let index = self.gprs.iter().position(|n| *n == name)?;
        self.gpr(index)
    }
}

/// Hands out argument registers in order, then stack slots.
#[derive(Debug)]
pub(crate) struct StorageAllocator {
    regs: RegisterFile,
    next_gpr: usize,
    next_fpr: usize,
    next_stack: u64,
    stack_base: u64,
}

impl StorageAllocator {
    pub(crate) fn new(regs: RegisterFile, stack_base: u64) -> Self {
        Self {
            regs,
            next_gpr: 0,
            next_fpr: 0,
            next_stack: stack_base,
            stack_base,
        }
    }

    pub(crate) fn gprs_left(&self) -> usize {
        self.regs.arg_gprs.saturating_sub(self.next_gpr)
    }

    pub(crate) fn fprs_left(&self) -> usize {
        self.regs.arg_fprs.saturating_sub(self.next_fpr)
    }

    pub(crate) fn gpr(&mut self) -> Option<Storage> {
        if self.gprs_left() == 0 {
            return None;
        }
        let storage = self.regs.gpr(self.next_gpr)?;
        self.next_gpr += 1;
        Some(storage)
    }

    pub(crate) fn fpr(&mut self) -> Option<Storage> {
        if self.fprs_left() == 0 {
            return None;
        }
        let storage = self.regs.fpr(self.next_fpr)?;
        self.next_fpr += 1;
        Some(storage)
    }

    pub(crate) fn fprs_used(&self) -> usize {
        self.next_fpr
    }

    /// Round the next GPR up to a multiple of `count`.
    pub(crate) fn align_gprs(&mut self, count: usize) {
        if count > 1 {
            self.next_gpr = self.next_gpr.div_ceil(count) * count;
        }
    }

    pub(crate) fn exhaust_gprs(&mut self) {
        self.next_gpr = self.regs.arg_gprs;
    }

    pub(crate) fn exhaust_fprs(&mut self) {
        self.next_fpr = self.regs.arg_fprs;
    }

    /// Next stack location for `size` bytes, aligned to at least one slot.
    pub(crate) fn stack(&mut self, size: u64, align: u64) -> Storage {
        let offset = align_to(self.next_stack, align.max(STACK_SLOT_SIZE));
        let size = align_to(size, STACK_SLOT_SIZE);
        self.next_stack = offset + size;
        Storage::Stack { offset, size }
    }

    /// GPR if one is left, otherwise a stack slot.
    pub(crate) fn gpr_or_stack(&mut self) -> Storage {
        match self.gpr() {
            Some(storage) => storage,
            None => self.stack(STACK_SLOT_SIZE, STACK_SLOT_SIZE),
        }
    }

    pub(crate) fn fpr_or_stack(&mut self) -> Storage {
        match self.fpr() {
            Some(storage) => storage,
            None => self.stack(STACK_SLOT_SIZE, STACK_SLOT_SIZE),
        }
    }

    /// Stack area size, 16-byte aligned. Zero when nothing went past the
    /// fixed save area and the area is empty.
    pub(crate) fn stack_size(&self) -> u64 {
        if self.next_stack == 0 && self.stack_base == 0 {
            return 0;
        }
        align_to(self.next_stack, 16)
    }
}

/// Arguments and returns must be scalars or non-empty groups.
pub(crate) fn check_layout(layout: &MemoryLayout) -> Result<(), AbiError> {
    match layout {
        MemoryLayout::Value(_) => Ok(()),
        MemoryLayout::Group(g) if g.byte_size() > 0 => Ok(()),
        other => Err(AbiError::UnsupportedLayout(other.to_string())),
    }
}

/// Validate every layout and the variadic tail of a signature.
pub(crate) fn check_signature(descriptor: &FunctionDescriptor, options: &LinkerOptions) -> Result<(), AbiError> {
    let args = descriptor.argument_layouts();
    if let Some(first) = options.variadic_index() {
        if first > args.len() {
            return Err(AbiError::InvalidVariadicIndex {
                index: first,
                count: args.len(),
            });
        }
    }
    for (index, layout) in args.iter().enumerate() {
        check_layout(layout)?;
        if options.is_variadic_arg(index) {
            check_variadic_layout(index, layout)?;
        }
    }
    if let Some(ret) = descriptor.return_layout() {
        check_layout(ret)?;
    }
    Ok(())
}

/// Variadic arguments must already have gone through C default argument
/// promotion.
fn check_variadic_layout(index: usize, layout: &MemoryLayout) -> Result<(), AbiError> {
    if let MemoryLayout::Value(value) = layout {
        if matches!(
            value.carrier(),
            Carrier::Bool | Carrier::Byte | Carrier::Char | Carrier::Short | Carrier::Float
        ) {
            return Err(AbiError::InvalidVariadicLayout {
                index,
                layout: layout.to_string(),
            });
        }
    }
    Ok(())
}

/// Accessor for the common promotion rule: integers widen to a long,
/// pointers stay pointers, floats keep their own width.
pub(crate) fn natural_accessor(layout: &ValueLayout) -> Accessor {
    match layout.carrier() {
        Carrier::Float => Accessor::Float,
        Carrier::Double => Accessor::Double,
        Carrier::Address => Accessor::Address,
        _ => Accessor::Long,
    }
}

/// Split `size` bytes into 8-byte chunks, one per storage location.
pub(crate) fn raw_chunks(size: u64, storage: impl IntoIterator<Item = Storage>, left_justified: bool) -> Vec<StructChunk> {
    storage
        .into_iter()
        .enumerate()
        .map(|(i, storage)| {
            let offset = i as u64 * STACK_SLOT_SIZE;
            StructChunk {
                offset,
                size: size.saturating_sub(offset).min(STACK_SLOT_SIZE),
                storage,
                kind: ChunkKind::Raw { left_justified },
            }
        })
        .filter(|chunk| chunk.size > 0)
        .collect()
}

/// A whole struct passed by value on the stack.
pub(crate) fn stack_chunk(layout: &MemoryLayout, storage: Storage) -> StructChunk {
    StructChunk {
        offset: 0,
        size: layout.byte_size(),
        storage,
        kind: ChunkKind::Raw {
            left_justified: false,
        },
    }
}

/// Float members of a homogeneous floating point aggregate.
///
/// Returns the member carrier and count when every scalar leaf has the same
/// floating point carrier, there are between 1 and `max` of them, and they
/// tile the aggregate without gaps.
pub(crate) fn homogeneous_float_members(layout: &MemoryLayout, max: usize) -> Option<(Carrier, Vec<u64>)> {
    let MemoryLayout::Group(group) = layout else {
        return None;
    };
    let fields = layout.scalar_fields();
    let (_, first) = fields.first()?;
    let carrier = first.carrier();
    if !carrier.is_floating() || fields.len() > max {
        return None;
    }
    let uniform = fields.iter().all(|(_, f)| f.carrier() == carrier);
    let tiles = group.byte_size() == carrier.byte_size() * fields.len() as u64
        && fields
            .iter()
            .enumerate()
            .all(|(i, (offset, _))| *offset == i as u64 * carrier.byte_size());
    if uniform && tiles {
        Some((carrier, fields.iter().map(|(offset, _)| *offset).collect()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGS: RegisterFile = RegisterFile {
        gprs: &["a", "b", "ret"],
        fprs: &["f0"],
        arg_gprs: 2,
        arg_fprs: 1,
    };

    #[test]
    fn test_allocator_spills_to_stack() {
        let mut alloc = StorageAllocator::new(REGS, 0);
        assert_eq!(alloc.gpr_or_stack(), Storage::Gpr { index: 0, name: "a" });
        assert_eq!(alloc.gpr_or_stack(), Storage::Gpr { index: 1, name: "b" });
        assert_eq!(alloc.gpr_or_stack(), Storage::Stack { offset: 0, size: 8 });
        assert_eq!(alloc.stack(12, 16), Storage::Stack { offset: 16, size: 16 });
        assert_eq!(alloc.stack_size(), 32);
    }

    #[test]
    fn test_return_only_registers_are_not_handed_out() {
        let mut alloc = StorageAllocator::new(REGS, 0);
        alloc.exhaust_gprs();
        assert_eq!(alloc.gpr(), None);
        assert_eq!(REGS.named_gpr("ret"), Some(Storage::Gpr { index: 2, name: "ret" }));
    }

    #[test]
    fn test_raw_chunks_cover_tail() {
        let chunks = raw_chunks(12, [Storage::Gpr { index: 0, name: "a" }, Storage::Gpr { index: 1, name: "b" }], false);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].offset, 8);
        assert_eq!(chunks[1].size, 4);
    }

    #[test]
    fn test_homogeneous_float_members() {
        let hfa = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::FLOAT),
            MemoryLayout::from(ValueLayout::FLOAT),
            MemoryLayout::from(ValueLayout::FLOAT),
        ])
        .unwrap();
        let (carrier, offsets) = homogeneous_float_members(&hfa, 4).unwrap();
        assert_eq!(carrier, Carrier::Float);
        assert_eq!(offsets, vec![0, 4, 8]);

        let mixed = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::FLOAT),
            MemoryLayout::from(ValueLayout::INT),
        ])
        .unwrap();
        assert!(homogeneous_float_members(&mixed, 4).is_none());
        assert!(homogeneous_float_members(&hfa, 2).is_none());
    }

    #[test]
    fn test_variadic_layouts_must_be_promoted() {
        let desc = FunctionDescriptor::of_void([ValueLayout::ADDRESS.into(), ValueLayout::FLOAT.into()]);
        let err = check_signature(&desc, &LinkerOptions::first_variadic_arg(1)).unwrap_err();
        assert!(matches!(err, AbiError::InvalidVariadicLayout { index: 1, .. }));
        assert!(check_signature(&desc, &LinkerOptions::default()).is_ok());
        assert!(matches!(
            check_signature(&desc, &LinkerOptions::first_variadic_arg(3)),
            Err(AbiError::InvalidVariadicIndex { index: 3, count: 2 })
        ));
    }

    #[test]
    fn test_sequence_argument_is_rejected() {
        let seq = MemoryLayout::sequence_layout(2, ValueLayout::INT.into()).unwrap();
        assert!(matches!(check_layout(&seq), Err(AbiError::UnsupportedLayout(_))));
    }
}
