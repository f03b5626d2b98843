//! Buffer read/write helpers and scalar encoding.

use crate::layout::{ByteOrder, Carrier, ValueLayout};

use super::{MemoryError, Value};

/// Align a value up to the nearest multiple of `align` (a power of two).
#[inline]
pub fn align_to(val: u64, align: u64) -> u64 {
    val.next_multiple_of(align.max(1))
}

/// Safe buffer slice read helper.
#[inline]
pub fn read_slice(buffer: &[u8], start: usize, len: usize) -> Result<&[u8], MemoryError> {
    let end = start.saturating_add(len);
    buffer
        .get(start..end)
        .ok_or(MemoryError::BufferTooSmall {
            needed: end as u64,
            available: buffer.len() as u64,
        })
}

/// Safe buffer slice write helper.
#[inline]
pub fn write_slice(buffer: &mut [u8], start: usize, data: &[u8]) -> Result<(), MemoryError> {
    let end = start.saturating_add(data.len());
    let available = buffer.len() as u64;
    buffer
        .get_mut(start..end)
        .ok_or(MemoryError::BufferTooSmall {
            needed: end as u64,
            available,
        })?
        .copy_from_slice(data);
    Ok(())
}

fn fixed<const N: usize>(bytes: &[u8], order: ByteOrder) -> Result<[u8; N], MemoryError> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_slice(bytes, 0, N)?);
    if order != ByteOrder::LittleEndian {
        out.reverse();
    }
    Ok(out)
}

fn ordered<const N: usize>(mut le: [u8; N], order: ByteOrder) -> Vec<u8> {
    if order != ByteOrder::LittleEndian {
        le.reverse();
    }
    le.to_vec()
}

/// Encode `value` with the width and byte order of `layout`.
pub fn encode(layout: &ValueLayout, value: &Value) -> Result<Vec<u8>, MemoryError> {
    let order = layout.order();
    let bytes = match (layout.carrier(), value) {
        (Carrier::Bool, Value::Bool(v)) => vec![u8::from(*v)],
        (Carrier::Byte, Value::Byte(v)) => v.to_le_bytes().to_vec(),
        (Carrier::Char, Value::Char(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Short, Value::Short(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Int, Value::Int(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Long, Value::Long(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Float, Value::Float(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Double, Value::Double(v)) => ordered(v.to_le_bytes(), order),
        (Carrier::Address, Value::Address(v)) => ordered(v.to_le_bytes(), order),
        (carrier, other) => {
            return Err(MemoryError::TypeMismatch {
                expected: carrier.name().to_string(),
                got: other.carrier().name().to_string(),
            });
        }
    };
    Ok(bytes)
}

/// Decode a value of `layout` from the start of `bytes`.
pub fn decode(layout: &ValueLayout, bytes: &[u8]) -> Result<Value, MemoryError> {
    let order = layout.order();
    let value = match layout.carrier() {
        Carrier::Bool => Value::Bool(fixed::<1>(bytes, order)? != [0]),
        Carrier::Byte => Value::Byte(i8::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Char => Value::Char(u16::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Short => Value::Short(i16::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Int => Value::Int(i32::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Long => Value::Long(i64::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Float => Value::Float(f32::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Double => Value::Double(f64::from_le_bytes(fixed(bytes, order)?)),
        Carrier::Address => Value::Address(u64::from_le_bytes(fixed(bytes, order)?)),
    };
    Ok(value)
}
