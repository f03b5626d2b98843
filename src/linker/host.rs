//! Calls into real native code through libffi.
//!
//! [`HostInvoker`] turns a marshalled [`CallFrame`] back into argument
//! values and hands them to `ffi_call`, so a downcall handle arranged for
//! the host ABI reaches real functions. Upcall stubs on the host are
//! libffi closures ([`Trampoline`]) whose code pointer is the stub address.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use libffi::low::{ffi_arg, ffi_cif};
use libffi::middle::{Cif, Closure, CodePtr, Type};

use crate::abi::{Abi, CallingSequence, FunctionDescriptor, Platform, natural_accessor};
use crate::layout::{ByteOrder, Carrier, GroupKind, GroupLayout, MemoryLayout, ValueLayout};
use crate::logging::{debug, warn};
use crate::memory::{Arena, MemoryError, NativeMemory, Value, buffer};

use super::frame::{CallFrame, decode_scalar, encode_scalar};
use super::upcall::{UpcallEntry, read_arguments, write_result};
use super::{LinkerError, NativeInvoker};

fn carrier_type(carrier: Carrier) -> Type {
    match carrier {
        Carrier::Bool => Type::u8(),
        Carrier::Byte => Type::i8(),
        Carrier::Char => Type::u16(),
        Carrier::Short => Type::i16(),
        Carrier::Int => Type::i32(),
        Carrier::Long => Type::i64(),
        Carrier::Float => Type::f32(),
        Carrier::Double => Type::f64(),
        Carrier::Address => Type::pointer(),
    }
}

fn byte_run(count: u64) -> Option<Vec<Type>> {
    let count = usize::try_from(count).ok()?;
    Some(std::iter::repeat_n(Type::u8(), count).collect())
}

/// A union is passed as its most aligned member followed by filler bytes.
fn union_members(group: &GroupLayout) -> Option<Vec<Type>> {
    let widest = group
        .members()
        .iter()
        .filter(|m| m.byte_size() > 0)
        .max_by_key(|m| (m.byte_alignment(), m.byte_size()))?;
    let mut members = vec![ffi_type(widest)?];
    members.extend(byte_run(group.byte_size().saturating_sub(widest.byte_size()))?);
    Some(members)
}

/// The libffi type of `layout`, or `None` for layouts without bytes.
fn ffi_type(layout: &MemoryLayout) -> Option<Type> {
    let members = match layout {
        MemoryLayout::Value(value) => return Some(carrier_type(value.carrier())),
        MemoryLayout::Sequence(sequence) => {
            let element = ffi_type(sequence.element_layout())?;
            let count = usize::try_from(sequence.element_count()).ok()?;
            std::iter::repeat_n(element, count).collect()
        }
        MemoryLayout::Group(group) => match group.kind() {
            GroupKind::Struct => group.members().iter().filter_map(ffi_type).collect(),
            GroupKind::Union => union_members(group)?,
        },
        MemoryLayout::Padding(padding) => byte_run(padding.byte_size())?,
    };
    (!members.is_empty()).then(|| Type::structure(members))
}

fn cif_for(descriptor: &FunctionDescriptor, variadic_index: Option<usize>) -> Result<Cif, LinkerError> {
    let native = |layout: &MemoryLayout| ffi_type(layout).ok_or_else(|| LinkerError::NoNativeType(layout.to_string()));
    let args = descriptor
        .argument_layouts()
        .iter()
        .map(native)
        .collect::<Result<Vec<_>, _>>()?;
    let result = match descriptor.return_layout() {
        Some(layout) => native(layout)?,
        None => Type::void(),
    };
    Ok(match variadic_index {
        Some(fixed) => Cif::new_variadic(args, fixed, result),
        None => Cif::new(args, result),
    })
}

fn native_order(layout: &ValueLayout) -> ValueLayout {
    layout.clone().with_order(ByteOrder::native())
}

/// `value` laid out the way C stores it, at the start of a word.
fn argument_word(layout: &ValueLayout, value: &Value) -> Result<u64, LinkerError> {
    let bytes = buffer::encode(&native_order(layout), value)?;
    let mut word = [0u8; 8];
    for (slot, byte) in word.iter_mut().zip(&bytes) {
        *slot = *byte;
    }
    Ok(u64::from_ne_bytes(word))
}

/// Read a result out of the return buffer libffi filled. Integral results
/// are widened to a full `ffi_arg`.
fn returned_value(layout: &MemoryLayout, rvalue: &[u64], arena: &Arena) -> Result<Value, LinkerError> {
    let bytes: Vec<u8> = rvalue.iter().flat_map(|word| word.to_ne_bytes()).collect();
    match layout.as_value() {
        Some(scalar) if scalar.carrier().is_floating() => Ok(buffer::decode(&native_order(scalar), &bytes)?),
        Some(scalar) => {
            let word = rvalue.first().copied().unwrap_or_default();
            Ok(decode_scalar(natural_accessor(scalar), scalar, word))
        }
        None => {
            let size = usize::try_from(layout.byte_size()).unwrap_or(usize::MAX);
            let contents = buffer::read_slice(&bytes, 0, size)?;
            Ok(Value::Address(arena.allocate_bytes(contents, layout.byte_alignment())?.address()))
        }
    }
}

/// A [`NativeInvoker`] that calls functions of this process.
///
/// Only calling sequences arranged for the host ABI, over host memory, can
/// be invoked.
#[derive(Debug, Clone, Copy)]
pub struct HostInvoker {
    abi: Abi,
}

impl HostInvoker {
    pub fn new() -> Result<Self, LinkerError> {
        let platform = Platform::host().ok_or(LinkerError::UnsupportedHost)?;
        let abi = Abi::for_platform(platform).map_err(|_| LinkerError::UnsupportedHost)?;
        Ok(Self { abi })
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }
}

impl NativeInvoker for HostInvoker {
    fn invoke(
        &self,
        target: u64,
        sequence: &CallingSequence,
        frame: &mut CallFrame,
        arena: &Arena,
    ) -> Result<(), LinkerError> {
        if sequence.abi() != self.abi {
            return Err(LinkerError::ForeignAbi {
                host: self.abi.to_string(),
                got: sequence.abi().to_string(),
            });
        }
        let memory = arena.memory();
        if !memory.is_host() {
            return Err(LinkerError::SimulatedMemory);
        }
        let descriptor = sequence.descriptor();
        let cif = cif_for(descriptor, sequence.options().variadic_index())?;

        // Struct copies made while unpacking the frame live until the call
        // has returned and its result is back in the frame.
        let scratch = Arena::with_memory(memory.clone());
        let args = read_arguments(sequence, frame, &scratch)?;
        let layouts = descriptor.argument_layouts();

        let mut words = vec![0u64; args.len()];
        let mut pointers: Vec<*mut c_void> = Vec::with_capacity(args.len());
        for ((layout, value), word) in layouts.iter().zip(&args).zip(words.iter_mut()) {
            let pointer = match layout.as_value() {
                Some(scalar) => {
                    *word = argument_word(scalar, value)?;
                    std::ptr::from_mut(word).cast::<c_void>()
                }
                None => {
                    let address = value.as_address().unwrap_or_default();
                    if !memory.is_mapped(address, layout.byte_size()) {
                        return Err(MemoryError::UnmappedAddress {
                            address,
                            len: layout.byte_size(),
                        }
                        .into());
                    }
                    address as usize as *mut c_void
                }
            };
            pointers.push(pointer);
        }

        let return_size = descriptor.return_layout().map_or(0, MemoryLayout::byte_size);
        let words_needed = usize::try_from(return_size.div_ceil(8)).unwrap_or(usize::MAX);
        let mut rvalue = vec![0u64; words_needed.max(1)];
        let code = CodePtr(target as usize as *mut c_void);
        debug!(target, %descriptor, "native downcall");
        // SAFETY: the cif matches the descriptor the caller vouched for when
        // handing us `target`; every argument pointer refers to a live word
        // or to mapped host memory, and the result buffer covers the return
        // type rounded up to whole words.
        unsafe {
            libffi::raw::ffi_call(
                cif.as_raw_ptr(),
                Some(*code.as_fun()),
                rvalue.as_mut_ptr().cast::<c_void>(),
                pointers.as_mut_ptr(),
            );
        }

        let result = descriptor
            .return_layout()
            .map(|layout| returned_value(layout, &rvalue, &scratch))
            .transpose()?;
        write_result(sequence, memory, frame, result)
    }
}

/// Native code for one upcall stub.
///
/// Owns a reference to the stub's entry, which the closure borrows; the
/// closure is freed before that reference is released.
pub(crate) struct Trampoline {
    closure: ManuallyDrop<Closure<'static>>,
    entry: *const UpcallEntry,
    address: u64,
}

// SAFETY: the closure's code and the entry behind the pointer are immutable
// once built, and `UpcallEntry` is itself Send + Sync.
unsafe impl Send for Trampoline {}
unsafe impl Sync for Trampoline {}

impl Trampoline {
    pub(crate) fn new(entry: Arc<UpcallEntry>) -> Result<Self, LinkerError> {
        if !entry.memory.is_host() {
            return Err(LinkerError::SimulatedMemory);
        }
        let cif = cif_for(entry.sequence.descriptor(), None)?;
        let entry = Arc::into_raw(entry);
        // SAFETY: the pointer came from `Arc::into_raw` and is only released
        // in `drop`, after the closure borrowing it.
        let userdata: &'static UpcallEntry = unsafe { &*entry };
        let closure = Closure::new(cif, upcall_entry_point, userdata);
        let address = *closure.code_ptr() as usize as u64;
        Ok(Self {
            closure: ManuallyDrop::new(closure),
            entry,
            address,
        })
    }

    pub(crate) fn address(&self) -> u64 {
        self.address
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        // SAFETY: `closure` is dropped exactly once, here, and nothing can
        // reach `entry` through it afterwards.
        unsafe {
            ManuallyDrop::drop(&mut self.closure);
            drop(Arc::from_raw(self.entry));
        }
    }
}

unsafe extern "C" fn upcall_entry_point(
    _cif: &ffi_cif,
    result: &mut u64,
    args: *const *const c_void,
    entry: &UpcallEntry,
) {
    let result = std::ptr::from_mut(result).cast::<u8>();
    // SAFETY: libffi passes one pointer per argument of the closure's cif,
    // and a result buffer sized for its return type.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { run_upcall(entry, args, result) }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(_err)) => {
            warn!(error = %_err, "native upcall failed");
        }
        Err(_) => {
            warn!("native upcall panicked");
        }
    }
}

/// # Safety
///
/// `args` must hold one valid pointer per argument of the entry's
/// descriptor, and `result` must be writable for its return type.
unsafe fn run_upcall(entry: &UpcallEntry, args: *const *const c_void, result: *mut u8) -> Result<(), LinkerError> {
    entry.scope.check_alive()?;
    let arena = Arena::with_memory(entry.memory.clone());
    let descriptor = entry.sequence.descriptor();
    let layouts = descriptor.argument_layouts();
    let mut values = Vec::with_capacity(layouts.len());
    for (index, layout) in layouts.iter().enumerate() {
        let len = usize::try_from(layout.byte_size()).map_err(|_| LinkerError::NoNativeType(layout.to_string()))?;
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { std::slice::from_raw_parts((*args.add(index)).cast::<u8>(), len) };
        values.push(match layout.as_value() {
            Some(scalar) => buffer::decode(&native_order(scalar), bytes)?,
            None => Value::Address(arena.allocate_bytes(bytes, layout.byte_alignment())?.address()),
        });
    }

    let value = (entry.target)(&values, &arena);
    let Some(layout) = descriptor.return_layout() else {
        return Ok(());
    };
    let value = value.ok_or_else(|| LinkerError::MissingReturnValue(layout.to_string()))?;
    let bytes = result_bytes(layout, &value, &entry.memory)?;
    // SAFETY: guaranteed by the caller.
    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), result, bytes.len()) };
    Ok(())
}

/// The bytes libffi expects in a closure's result buffer. Integral results
/// are widened to a full `ffi_arg`.
fn result_bytes(layout: &MemoryLayout, value: &Value, memory: &NativeMemory) -> Result<Vec<u8>, LinkerError> {
    let mismatch = || LinkerError::ReturnMismatch {
        expected: layout.to_string(),
        got: value.to_string(),
    };
    match layout.as_value() {
        Some(scalar) if scalar.carrier() != value.carrier() => Err(mismatch()),
        Some(scalar) if scalar.carrier().is_floating() => Ok(buffer::encode(&native_order(scalar), value)?),
        Some(scalar) => {
            let bits = encode_scalar(natural_accessor(scalar), value).ok_or_else(mismatch)?;
            Ok((bits as ffi_arg).to_ne_bytes().to_vec())
        }
        None => {
            let address = value.as_address().ok_or_else(mismatch)?;
            Ok(memory.read(address, layout.byte_size())?)
        }
    }
}
