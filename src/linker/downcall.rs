//! Managed to native calls.

use std::sync::Arc;

use crate::abi::{ArgumentBinding, CallingSequence, FunctionDescriptor, ReturnBinding};
use crate::layout::MemoryLayout;
use crate::logging::debug;
use crate::memory::{Arena, MemorySegment, Value, buffer};

use super::frame::{CallFrame, decode_scalar, encode_scalar};
use super::{LinkerError, NativeInvoker};

/// A bridge that calls native functions of one signature.
///
/// The handle holds a shared, immutable calling sequence and may be invoked
/// from many threads at once; every invocation builds its own frame.
#[derive(Clone)]
pub struct DowncallHandle {
    sequence: Arc<CallingSequence>,
    invoker: Arc<dyn NativeInvoker>,
}

impl DowncallHandle {
    pub(crate) fn new(sequence: Arc<CallingSequence>, invoker: Arc<dyn NativeInvoker>) -> Self {
        Self { sequence, invoker }
    }

    pub fn calling_sequence(&self) -> &CallingSequence {
        &self.sequence
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        self.sequence.descriptor()
    }

    /// Call the native function at `target`.
    ///
    /// Struct arguments are passed as the address of their contents. Struct
    /// results, and the buffers and by-reference copies the call needs, are
    /// allocated in `arena`; a struct result comes back as its address.
    pub fn invoke(&self, target: u64, arena: &Arena, args: &[Value]) -> Result<Option<Value>, LinkerError> {
        if target == 0 {
            return Err(LinkerError::NullTarget);
        }
        let seq = &self.sequence;
        let layouts = seq.descriptor().argument_layouts();
        if args.len() != layouts.len() {
            return Err(LinkerError::ArgumentCount {
                expected: layouts.len(),
                got: args.len(),
            });
        }

        let mut frame = CallFrame::new(seq.abi(), seq.stack_size());
        frame.vector_count = seq.vector_count();
        let return_buffer = self.prepare_return_buffer(&mut frame, arena)?;
        for (index, ((binding, layout), value)) in seq.arguments().iter().zip(layouts).zip(args).enumerate() {
            self.marshal_argument(&mut frame, arena, index, binding, layout, value)?;
        }

        debug!(
            abi = %seq.abi(),
            target,
            descriptor = %seq.descriptor(),
            critical = seq.options().is_critical(),
            "downcall"
        );
        self.invoker.invoke(target, seq, &mut frame, arena)?;
        self.unmarshal_return(&frame, arena, return_buffer)
    }

    fn prepare_return_buffer(&self, frame: &mut CallFrame, arena: &Arena) -> Result<Option<MemorySegment>, LinkerError> {
        let ReturnBinding::InMemory {
            size,
            alignment,
            pointer,
            ..
        } = self.sequence.return_binding()
        else {
            return Ok(None);
        };
        let segment = arena.allocate(*size, *alignment)?;
        frame.write(*pointer, segment.address())?;
        Ok(Some(segment))
    }

    fn marshal_argument(
        &self,
        frame: &mut CallFrame,
        arena: &Arena,
        index: usize,
        binding: &ArgumentBinding,
        layout: &MemoryLayout,
        value: &Value,
    ) -> Result<(), LinkerError> {
        let mismatch = || LinkerError::ArgumentMismatch {
            index,
            expected: layout.to_string(),
            got: value.to_string(),
        };
        match binding {
            ArgumentBinding::Value { accessor, storage } => {
                let bits = layout.as_value()
                    .filter(|v| v.carrier() == value.carrier())
                    .and_then(|_| encode_scalar(*accessor, value))
                    .ok_or_else(mismatch)?;
                for location in storage {
                    frame.write(*location, bits)?;
                }
            }
            ArgumentBinding::Struct { size, chunks } => {
                let address = value.as_address().ok_or_else(mismatch)?;
                let bytes = arena.memory().read(address, *size)?;
                let widen = self.sequence.abi().widens_float_registers();
                for chunk in chunks {
                    let start = usize::try_from(chunk.offset).unwrap_or(usize::MAX);
                    let len = usize::try_from(chunk.size).unwrap_or(usize::MAX);
                    let part = buffer::read_slice(&bytes, start, len)?;
                    frame.write_chunk(chunk, part, widen)?;
                }
            }
            ArgumentBinding::StructReference {
                size,
                alignment,
                storage,
            } => {
                let address = value.as_address().ok_or_else(mismatch)?;
                let bytes = arena.memory().read(address, *size)?;
                let copy = arena.allocate_bytes(&bytes, *alignment)?;
                frame.write(*storage, copy.address())?;
            }
        }
        Ok(())
    }

    fn unmarshal_return(
        &self,
        frame: &CallFrame,
        arena: &Arena,
        return_buffer: Option<MemorySegment>,
    ) -> Result<Option<Value>, LinkerError> {
        let seq = &self.sequence;
        let Some(layout) = seq.descriptor().return_layout() else {
            return Ok(None);
        };
        match seq.return_binding() {
            ReturnBinding::Void => Ok(None),
            ReturnBinding::Value { accessor, storage } => {
                let value = layout.as_value().ok_or_else(|| LinkerError::ReturnMismatch {
                    expected: layout.to_string(),
                    got: "scalar".to_string(),
                })?;
                Ok(Some(decode_scalar(*accessor, value, frame.read(*storage)?)))
            }
            ReturnBinding::Struct { chunks, .. } => {
                let segment = arena.allocate_layout(layout)?;
                let widen = seq.abi().widens_float_registers();
                for chunk in chunks {
                    segment.write_bytes(chunk.offset, &frame.read_chunk(chunk, widen)?)?;
                }
                Ok(Some(Value::Address(segment.address())))
            }
            ReturnBinding::InMemory { .. } => Ok(return_buffer.map(|segment| Value::Address(segment.address()))),
        }
    }
}

impl std::fmt::Debug for DowncallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DowncallHandle")
            .field("abi", &self.sequence.abi())
            .field("descriptor", &self.sequence.descriptor().to_string())
            .finish()
    }
}
