//! Bounds-checked views over native memory.

use std::fmt;

use crate::layout::{MemoryLayout, ValueLayout};

use super::{MemoryError, NativeMemory, Scope, Value, buffer};

/// A contiguous region of native memory with a size and an owning scope.
///
/// All accesses are checked against the segment bounds, the alignment of
/// the accessed layout, and the liveness of the scope.
#[derive(Clone)]
pub struct MemorySegment {
    memory: NativeMemory,
    scope: Scope,
    address: u64,
    size: u64,
}

impl MemorySegment {
    pub(crate) fn new(memory: NativeMemory, scope: Scope, address: u64, size: u64) -> Self {
        Self {
            memory,
            scope,
            address,
            size,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn byte_size(&self) -> u64 {
        self.size
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn memory(&self) -> &NativeMemory {
        &self.memory
    }

    /// Validate `[offset, offset + len)` and return its absolute address.
    fn check_access(&self, offset: u64, len: u64) -> Result<u64, MemoryError> {
        self.scope.check_alive()?;
        let out_of_bounds = MemoryError::OutOfBounds {
            offset,
            len,
            size: self.size,
        };
        let end = offset.checked_add(len).ok_or(out_of_bounds.clone())?;
        if end > self.size {
            return Err(out_of_bounds);
        }
        self.address
            .checked_add(offset)
            .ok_or(MemoryError::UnmappedAddress {
                address: self.address,
                len: end,
            })
    }

    fn check_alignment(address: u64, alignment: u64) -> Result<(), MemoryError> {
        if alignment > 1 && address % alignment != 0 {
            return Err(MemoryError::Misaligned { address, alignment });
        }
        Ok(())
    }

    /// Sub-segment of `len` bytes starting at `offset`.
    pub fn as_slice(&self, offset: u64, len: u64) -> Result<MemorySegment, MemoryError> {
        let address = self.check_access(offset, len)?;
        Ok(Self::new(self.memory.clone(), self.scope.clone(), address, len))
    }

    /// Sub-segment for `layout` at `offset`, checking the layout alignment.
    pub fn as_slice_layout(&self, offset: u64, layout: &MemoryLayout) -> Result<MemorySegment, MemoryError> {
        let slice = self.as_slice(offset, layout.byte_size())?;
        Self::check_alignment(slice.address, layout.byte_alignment())?;
        Ok(slice)
    }

    /// Check that `layout` placed at `offset` fits this segment and is aligned.
    pub fn check_enclosing_layout(&self, offset: u64, layout: &MemoryLayout) -> Result<(), MemoryError> {
        let address = self.check_access(offset, layout.byte_size())?;
        Self::check_alignment(address, layout.byte_alignment())
    }

    /// Same address, new size. The result is still checked against the heap
    /// on every access.
    pub fn reinterpret(&self, size: u64) -> MemorySegment {
        Self::new(self.memory.clone(), self.scope.clone(), self.address, size)
    }

    pub fn read_bytes(&self, offset: u64, len: u64) -> Result<Vec<u8>, MemoryError> {
        let address = self.check_access(offset, len)?;
        self.memory.read(address, len)
    }

    pub fn write_bytes(&self, offset: u64, data: &[u8]) -> Result<(), MemoryError> {
        let address = self.check_access(offset, data.len() as u64)?;
        self.memory.write(address, data)
    }

    /// The whole segment contents.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MemoryError> {
        self.read_bytes(0, self.size)
    }

    /// Copy all of `source` to the start of this segment.
    pub fn copy_from(&self, source: &MemorySegment) -> Result<(), MemoryError> {
        let bytes = source.to_bytes()?;
        self.write_bytes(0, &bytes)
    }

    pub fn fill(&self, byte: u8) -> Result<(), MemoryError> {
        let len = usize::try_from(self.size).map_err(|_| MemoryError::AllocationOverflow { size: self.size })?;
        self.write_bytes(0, &vec![byte; len])
    }

    /// Read a value of `layout` at `offset`.
    pub fn get(&self, layout: &ValueLayout, offset: u64) -> Result<Value, MemoryError> {
        let address = self.check_access(offset, layout.byte_size())?;
        Self::check_alignment(address, layout.byte_alignment())?;
        let bytes = self.memory.read(address, layout.byte_size())?;
        buffer::decode(layout, &bytes)
    }

    /// Write `value` with `layout` at `offset`.
    pub fn set(&self, layout: &ValueLayout, offset: u64, value: Value) -> Result<(), MemoryError> {
        let bytes = buffer::encode(layout, &value)?;
        let address = self.check_access(offset, layout.byte_size())?;
        Self::check_alignment(address, layout.byte_alignment())?;
        self.memory.write(address, &bytes)
    }
}

impl PartialEq for MemorySegment {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.size == other.size && self.scope == other.scope
    }
}

impl fmt::Debug for MemorySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySegment")
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &self.size)
            .field("alive", &self.scope.is_alive())
            .finish()
    }
}

impl fmt::Display for MemorySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemorySegment{{ address: {:#x}, byteSize: {} }}", self.address, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Arena;

    #[test]
    fn test_get_set_round_trip() {
        let arena = Arena::new();
        let segment = arena.allocate(16, 8).unwrap();
        segment.set(&ValueLayout::DOUBLE, 8, Value::Double(2.5)).unwrap();
        assert_eq!(segment.get(&ValueLayout::DOUBLE, 8).unwrap(), Value::Double(2.5));
    }

    #[test]
    fn test_out_of_bounds() {
        let arena = Arena::new();
        let segment = arena.allocate(4, 4).unwrap();
        let err = segment.get(&ValueLayout::LONG, 0).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfBounds { offset: 0, len: 8, size: 4 }));
        assert!(segment.as_slice(2, 4).is_err());
    }

    #[test]
    fn test_misaligned_access() {
        let arena = Arena::new();
        let segment = arena.allocate(16, 8).unwrap();
        let err = segment.get(&ValueLayout::INT, 2).unwrap_err();
        assert!(matches!(err, MemoryError::Misaligned { alignment: 4, .. }));
    }

    #[test]
    fn test_copy_from_and_slice() {
        let arena = Arena::new();
        let source = arena.allocate_bytes(&[1, 2, 3, 4], 1).unwrap();
        let target = arena.allocate(8, 1).unwrap();
        target.as_slice(4, 4).unwrap().copy_from(&source).unwrap();
        assert_eq!(target.to_bytes().unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }
}
