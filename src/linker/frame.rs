//! The machine-level view of a call: register files and the outgoing stack.
//!
//! Downcalls fill a [`CallFrame`] from managed values and hand it to a
//! [`NativeInvoker`](super::NativeInvoker); upcalls read their arguments back
//! out of one. Both directions share the scalar and chunk codecs here, so a
//! value written by one side is read back identically by the other.

use crate::abi::{Abi, Accessor, ChunkKind, STACK_SLOT_SIZE, Storage, StructChunk};
use crate::layout::{ByteOrder, Carrier, ValueLayout};
use crate::memory::{Value, buffer};

use super::LinkerError;

/// Register contents and outgoing stack bytes of one call.
///
/// `gprs` and `fprs` have one 64-bit entry per register in the ABI's
/// register file, argument and return-only registers alike.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub gprs: Vec<u64>,
    pub fprs: Vec<u64>,
    pub stack: Vec<u8>,
    /// Vector register count passed to variadic callees, where the ABI has one.
    pub vector_count: Option<u8>,
    order: ByteOrder,
}

impl CallFrame {
    pub fn new(abi: Abi, stack_size: u64) -> Self {
        let regs = abi.registers();
        Self {
            gprs: vec![0; regs.gprs.len()],
            fprs: vec![0; regs.fprs.len()],
            stack: vec![0; usize::try_from(stack_size).unwrap_or_default()],
            vector_count: None,
            order: abi.byte_order(),
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn invalid(storage: Storage) -> LinkerError {
        LinkerError::InvalidStorage(storage.to_string())
    }

    /// Write `bytes` at `offset` of the stack area.
    fn write_stack(&mut self, offset: u64, bytes: &[u8]) -> Result<(), LinkerError> {
        let start = usize::try_from(offset).map_err(|_| LinkerError::InvalidStorage(format!("stack[{}]", offset)))?;
        buffer::write_slice(&mut self.stack, start, bytes)?;
        Ok(())
    }

    fn read_stack(&self, offset: u64, len: u64) -> Result<Vec<u8>, LinkerError> {
        let invalid = || LinkerError::InvalidStorage(format!("stack[{}]", offset));
        let start = usize::try_from(offset).map_err(|_| invalid())?;
        let len = usize::try_from(len).map_err(|_| invalid())?;
        Ok(buffer::read_slice(&self.stack, start, len)?.to_vec())
    }

    /// Store a 64-bit register image. Stack slots get the image in the
    /// frame's byte order.
    pub fn write(&mut self, storage: Storage, bits: u64) -> Result<(), LinkerError> {
        match storage {
            Storage::Gpr { index, .. } => {
                *self.gprs.get_mut(index).ok_or_else(|| Self::invalid(storage))? = bits;
            }
            Storage::Fpr { index, .. } => {
                *self.fprs.get_mut(index).ok_or_else(|| Self::invalid(storage))? = bits;
            }
            Storage::Stack { offset, .. } => {
                let bytes = match self.order {
                    ByteOrder::LittleEndian => bits.to_le_bytes(),
                    ByteOrder::BigEndian => bits.to_be_bytes(),
                };
                self.write_stack(offset, &bytes)?;
            }
        }
        Ok(())
    }

    pub fn read(&self, storage: Storage) -> Result<u64, LinkerError> {
        match storage {
            Storage::Gpr { index, .. } => self.gprs.get(index).copied().ok_or_else(|| Self::invalid(storage)),
            Storage::Fpr { index, .. } => self.fprs.get(index).copied().ok_or_else(|| Self::invalid(storage)),
            Storage::Stack { offset, .. } => {
                let bytes = self.read_stack(offset, STACK_SLOT_SIZE)?;
                let array: [u8; 8] = bytes.try_into().map_err(|_| Self::invalid(storage))?;
                Ok(match self.order {
                    ByteOrder::LittleEndian => u64::from_le_bytes(array),
                    ByteOrder::BigEndian => u64::from_be_bytes(array),
                })
            }
        }
    }

    /// Place the bytes of one struct chunk.
    pub(crate) fn write_chunk(&mut self, chunk: &StructChunk, bytes: &[u8], widen: bool) -> Result<(), LinkerError> {
        match chunk.kind {
            ChunkKind::Float | ChunkKind::Double => {
                let bits = float_chunk_bits(chunk.kind, bytes, self.order, widen)?;
                self.write(chunk.storage, bits)
            }
            ChunkKind::Raw { left_justified } => match chunk.storage {
                Storage::Stack { offset, size } => {
                    let pad = self.right_justify_pad(left_justified, chunk.size, size);
                    self.write_stack(offset + pad, bytes)
                }
                storage => {
                    let bits = pack_register(bytes, self.order, left_justified);
                    self.write(storage, bits)
                }
            },
        }
    }

    /// Bytes of one struct chunk, the inverse of [`write_chunk`](Self::write_chunk).
    pub(crate) fn read_chunk(&self, chunk: &StructChunk, widen: bool) -> Result<Vec<u8>, LinkerError> {
        match chunk.kind {
            ChunkKind::Float => {
                let bits = self.read(chunk.storage)?;
                let value = if widen {
                    f64::from_bits(bits) as f32
                } else {
                    f32::from_bits(bits as u32)
                };
                Ok(match self.order {
                    ByteOrder::LittleEndian => value.to_le_bytes().to_vec(),
                    ByteOrder::BigEndian => value.to_be_bytes().to_vec(),
                })
            }
            ChunkKind::Double => {
                let bits = self.read(chunk.storage)?;
                Ok(match self.order {
                    ByteOrder::LittleEndian => bits.to_le_bytes().to_vec(),
                    ByteOrder::BigEndian => bits.to_be_bytes().to_vec(),
                })
            }
            ChunkKind::Raw { left_justified } => match chunk.storage {
                Storage::Stack { offset, size } => {
                    let pad = self.right_justify_pad(left_justified, chunk.size, size);
                    self.read_stack(offset + pad, chunk.size)
                }
                storage => Ok(unpack_register(self.read(storage)?, chunk.size, self.order, left_justified)),
            },
        }
    }

    /// Big-endian slots hold short chunks in their low-order bytes unless
    /// the ABI left-justifies them.
    fn right_justify_pad(&self, left_justified: bool, chunk_size: u64, slot_size: u64) -> u64 {
        if self.order == ByteOrder::BigEndian && !left_justified && chunk_size < STACK_SLOT_SIZE {
            slot_size.min(STACK_SLOT_SIZE).saturating_sub(chunk_size)
        } else {
            0
        }
    }
}

fn float_chunk_bits(kind: ChunkKind, bytes: &[u8], order: ByteOrder, widen: bool) -> Result<u64, LinkerError> {
    let layout = match kind {
        ChunkKind::Float => ValueLayout::FLOAT,
        _ => ValueLayout::DOUBLE,
    };
    let value = buffer::decode(&layout.with_order(order), bytes)?;
    let accessor = match (kind, widen) {
        (ChunkKind::Float, false) => Accessor::Float,
        _ => Accessor::Double,
    };
    Ok(encode_scalar(accessor, &value).unwrap_or_default())
}

/// Register image of up to eight bytes of memory.
fn pack_register(bytes: &[u8], order: ByteOrder, left_justified: bool) -> u64 {
    let mut image = [0u8; 8];
    let len = bytes.len().min(8);
    let start = match order {
        ByteOrder::BigEndian if !left_justified => 8 - len,
        _ => 0,
    };
    if let (Some(dst), Some(src)) = (image.get_mut(start..start + len), bytes.get(..len)) {
        dst.copy_from_slice(src);
    }
    match order {
        ByteOrder::LittleEndian => u64::from_le_bytes(image),
        ByteOrder::BigEndian => u64::from_be_bytes(image),
    }
}

fn unpack_register(bits: u64, size: u64, order: ByteOrder, left_justified: bool) -> Vec<u8> {
    let image = match order {
        ByteOrder::LittleEndian => bits.to_le_bytes(),
        ByteOrder::BigEndian => bits.to_be_bytes(),
    };
    let len = usize::try_from(size).unwrap_or(8).min(8);
    let start = match order {
        ByteOrder::BigEndian if !left_justified => 8 - len,
        _ => 0,
    };
    image.get(start..start + len).map(<[u8]>::to_vec).unwrap_or_default()
}

/// Widen `value` to the 64-bit register image `accessor` describes.
///
/// Returns `None` when the value cannot be represented by the accessor.
pub(crate) fn encode_scalar(accessor: Accessor, value: &Value) -> Option<u64> {
    match accessor {
        Accessor::Long => value.as_i64().map(|v| v as u64),
        Accessor::Address => value.as_address(),
        Accessor::Float => value.as_f64().map(|v| u64::from((v as f32).to_bits())),
        Accessor::Double => value.as_f64().map(f64::to_bits),
    }
}

/// Narrow a register image back to a value of `layout`'s carrier.
pub(crate) fn decode_scalar(accessor: Accessor, layout: &ValueLayout, bits: u64) -> Value {
    let float = |bits: u64| match accessor {
        Accessor::Float => f64::from(f32::from_bits(bits as u32)),
        _ => f64::from_bits(bits),
    };
    match layout.carrier() {
        Carrier::Bool => Value::Bool(bits & 0xff != 0),
        Carrier::Byte => Value::Byte(bits as i8),
        Carrier::Char => Value::Char(bits as u16),
        Carrier::Short => Value::Short(bits as i16),
        Carrier::Int => Value::Int(bits as i32),
        Carrier::Long => Value::Long(bits as i64),
        Carrier::Float => Value::Float(float(bits) as f32),
        Carrier::Double => Value::Double(float(bits)),
        Carrier::Address => Value::Address(bits),
    }
}
