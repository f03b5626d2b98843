//! Native to managed calls.
//!
//! An upcall stub is a native-callable address. On the host the address is
//! the code pointer of a libffi closure. Linkers for other ABIs hand out
//! synthetic addresses above [`UPCALL_STUB_BASE`], which
//! [`UpcallDispatcher`] resolves by playing the part of the native caller
//! when a downcall targets one of them.
//!
//! Either way a stub is registered under its address until the arena it was
//! created in closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::abi::{ArgumentBinding, CallingSequence, FunctionDescriptor, ReturnBinding};
use crate::logging::{debug, trace};
use crate::memory::{Arena, NativeMemory, Scope, Value};

use super::frame::{CallFrame, decode_scalar, encode_scalar};
use super::host::Trampoline;
use super::{LinkerError, NativeInvoker};

/// First synthetic stub address.
pub const UPCALL_STUB_BASE: u64 = 0x7fff_0000_0000;

/// Distance between consecutive stub addresses.
const STUB_SIZE: u64 = 16;

/// Managed code reachable through an upcall stub.
///
/// Struct arguments arrive as the address of a copy that lives for the
/// duration of the call. A struct result is returned as the address of its
/// contents, which may be allocated in the provided arena.
pub type UpcallTarget = Arc<dyn Fn(&[Value], &Arena) -> Option<Value> + Send + Sync>;

/// A native function pointer that calls back into managed code.
///
/// The stub is valid while the arena it was created in is open.
#[derive(Debug, Clone)]
pub struct UpcallStub {
    address: u64,
    descriptor: FunctionDescriptor,
    scope: Scope,
}

impl UpcallStub {
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    pub fn is_alive(&self) -> bool {
        self.scope.is_alive()
    }
}

pub(crate) struct UpcallEntry {
    pub(super) sequence: Arc<CallingSequence>,
    pub(super) target: UpcallTarget,
    pub(super) scope: Scope,
    pub(super) memory: NativeMemory,
}

impl UpcallEntry {
    fn call(&self, frame: &mut CallFrame) -> Result<(), LinkerError> {
        let arena = Arena::with_memory(self.memory.clone());
        let args = read_arguments(&self.sequence, frame, &arena)?;
        trace!(args = args.len(), "upcall arguments unmarshalled");
        let result = (self.target)(&args, &arena);
        write_result(&self.sequence, &self.memory, frame, result)
    }
}

/// Rebuild the argument values a downcall marshalled into `frame`.
///
/// Struct arguments passed in registers are copied into `arena`.
pub(crate) fn read_arguments(seq: &CallingSequence, frame: &CallFrame, arena: &Arena) -> Result<Vec<Value>, LinkerError> {
    let widen = seq.abi().widens_float_registers();
    let layouts = seq.descriptor().argument_layouts();
    let mut args = Vec::with_capacity(layouts.len());
    for (binding, layout) in seq.arguments().iter().zip(layouts) {
        let value = match binding {
            ArgumentBinding::Value { accessor, storage } => {
                let first = storage
                    .first()
                    .copied()
                    .ok_or_else(|| LinkerError::InvalidStorage(layout.to_string()))?;
                let value = layout.as_value().ok_or_else(|| LinkerError::InvalidStorage(layout.to_string()))?;
                decode_scalar(*accessor, value, frame.read(first)?)
            }
            ArgumentBinding::Struct { chunks, .. } => {
                let segment = arena.allocate_layout(layout)?;
                for chunk in chunks {
                    segment.write_bytes(chunk.offset, &frame.read_chunk(chunk, widen)?)?;
                }
                Value::Address(segment.address())
            }
            ArgumentBinding::StructReference { storage, .. } => Value::Address(frame.read(*storage)?),
        };
        args.push(value);
    }
    Ok(args)
}

/// Store a callee's result into the return registers or buffer of `frame`.
///
/// Struct results are read from `memory` at the address `result` holds.
pub(crate) fn write_result(
    seq: &CallingSequence,
    memory: &NativeMemory,
    frame: &mut CallFrame,
    result: Option<Value>,
) -> Result<(), LinkerError> {
    let Some(layout) = seq.descriptor().return_layout() else {
        return Ok(());
    };
    let value = result.ok_or_else(|| LinkerError::MissingReturnValue(layout.to_string()))?;
    let mismatch = || LinkerError::ReturnMismatch {
        expected: layout.to_string(),
        got: value.to_string(),
    };
    match seq.return_binding() {
        ReturnBinding::Void => {}
        ReturnBinding::Value { accessor, storage } => {
            let bits = layout.as_value()
                .filter(|v| v.carrier() == value.carrier())
                .and_then(|_| encode_scalar(*accessor, &value))
                .ok_or_else(mismatch)?;
            frame.write(*storage, bits)?;
        }
        ReturnBinding::Struct { size, chunks } => {
            let address = value.as_address().ok_or_else(mismatch)?;
            let bytes = memory.read(address, *size)?;
            let widen = seq.abi().widens_float_registers();
            for chunk in chunks {
                let start = usize::try_from(chunk.offset).unwrap_or(usize::MAX);
                let len = usize::try_from(chunk.size).unwrap_or(usize::MAX);
                let part = crate::memory::buffer::read_slice(&bytes, start, len)?;
                frame.write_chunk(chunk, part, widen)?;
            }
        }
        ReturnBinding::InMemory {
            size,
            pointer,
            returned_in,
            ..
        } => {
            let source = value.as_address().ok_or_else(mismatch)?;
            let destination = frame.read(*pointer)?;
            let bytes = memory.read(source, *size)?;
            memory.write(destination, &bytes)?;
            if let Some(register) = returned_in {
                frame.write(*register, destination)?;
            }
        }
    }
    Ok(())
}

struct Registered {
    entry: Arc<UpcallEntry>,
    /// Native code for the stub; `None` for synthetic addresses.
    _trampoline: Option<Trampoline>,
}

type Entries = RwLock<HashMap<u64, Registered>>;

/// Upcall stubs of one linker, keyed by stub address.
#[derive(Clone)]
pub(crate) struct UpcallRegistry {
    entries: Arc<Entries>,
    next_address: Arc<AtomicU64>,
}

impl UpcallRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            next_address: Arc::new(AtomicU64::new(UPCALL_STUB_BASE)),
        }
    }

    /// Register a stub calling `target`. With `native` set the stub gets a
    /// libffi closure as its address, otherwise a synthetic one.
    ///
    /// The stub is unregistered, and its closure freed, when `arena` closes.
    pub(crate) fn register(
        &self,
        sequence: Arc<CallingSequence>,
        target: UpcallTarget,
        arena: &Arena,
        native: bool,
    ) -> Result<UpcallStub, LinkerError> {
        let descriptor = sequence.descriptor().clone();
        let entry = Arc::new(UpcallEntry {
            sequence,
            target,
            scope: arena.scope().clone(),
            memory: arena.memory().clone(),
        });
        let trampoline = if native {
            Some(Trampoline::new(Arc::clone(&entry))?)
        } else {
            None
        };
        let address = match &trampoline {
            Some(trampoline) => trampoline.address(),
            None => self.next_address.fetch_add(STUB_SIZE, Ordering::Relaxed),
        };
        self.entries.write().insert(
            address,
            Registered {
                entry,
                _trampoline: trampoline,
            },
        );

        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        arena.scope().on_close(move || {
            if let Some(entries) = entries.upgrade() {
                let removed = entries.write().remove(&address);
                drop(removed);
                trace!(address, "upcall stub released");
            }
        });

        Ok(UpcallStub {
            address,
            descriptor,
            scope: arena.scope().clone(),
        })
    }

    fn get(&self, address: u64) -> Option<Arc<UpcallEntry>> {
        self.entries.read().get(&address).map(|r| Arc::clone(&r.entry))
    }

    /// True for a synthetic address this registry handed out earlier.
    fn issued(&self, address: u64) -> bool {
        (UPCALL_STUB_BASE..self.next_address.load(Ordering::Relaxed)).contains(&address)
            && (address - UPCALL_STUB_BASE) % STUB_SIZE == 0
    }

    /// Number of live stubs.
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// A [`NativeInvoker`] that routes calls to registered upcall stubs.
#[derive(Clone)]
pub struct UpcallDispatcher {
    registry: UpcallRegistry,
}

impl UpcallDispatcher {
    pub(crate) fn new(registry: UpcallRegistry) -> Self {
        Self { registry }
    }
}

impl NativeInvoker for UpcallDispatcher {
    fn invoke(
        &self,
        target: u64,
        _sequence: &CallingSequence,
        frame: &mut CallFrame,
        _arena: &Arena,
    ) -> Result<(), LinkerError> {
        let Some(entry) = self.registry.get(target) else {
            return Err(if self.registry.issued(target) {
                LinkerError::StubClosed(target)
            } else {
                LinkerError::UnknownTarget(target)
            });
        };
        if !entry.scope.is_alive() {
            return Err(LinkerError::StubClosed(target));
        }
        debug!(target, "upcall");
        entry.call(frame)
    }
}
