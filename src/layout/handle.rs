//! Handles derived from a resolved [`LayoutPath`](super::LayoutPath).
//!
//! Every handle takes a segment, a base offset into that segment, and one
//! dynamic index per open sequence element in the path. Indices are consumed
//! outermost first. Pointer hops consume their own indices before the ones
//! that belong to the final layout.

use crate::memory::{MemorySegment, Value};

use super::{LayoutError, MemoryLayout, ValueLayout};

/// Offset computation for a path: `base + offset + Σ stride[i] * index[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetHandle {
    offset: i64,
    strides: Vec<i64>,
    bounds: Vec<i64>,
}

impl OffsetHandle {
    pub(crate) fn new(offset: i64, strides: Vec<i64>, bounds: Vec<i64>) -> Self {
        Self {
            offset,
            strides,
            bounds,
        }
    }

    pub fn constant_offset(&self) -> i64 {
        self.offset
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn bounds(&self) -> &[i64] {
        &self.bounds
    }

    pub fn coordinate_count(&self) -> usize {
        self.strides.len()
    }

    /// Byte offset for `indices` relative to `base`.
    ///
    /// Every index is checked against its bound. Arithmetic is checked and
    /// overflow is an error, never a wrapped offset.
    pub fn compute(&self, base: u64, indices: &[i64]) -> Result<u64, LayoutError> {
        if indices.len() != self.strides.len() {
            return Err(LayoutError::CoordinateCount {
                expected: self.strides.len(),
                got: indices.len(),
            });
        }
        let mut offset = self.offset;
        for ((&index, &stride), &bound) in indices.iter().zip(&self.strides).zip(&self.bounds) {
            check_index(index, bound)?;
            offset = stride
                .checked_mul(index)
                .and_then(|delta| offset.checked_add(delta))
                .ok_or(LayoutError::OffsetOverflow)?;
        }
        base.checked_add_signed(offset)
            .ok_or(LayoutError::OffsetOverflow)
    }
}

fn check_index(index: i64, bound: i64) -> Result<(), LayoutError> {
    if index < 0 || index >= bound {
        return Err(LayoutError::IndexOutOfBounds { index, bound });
    }
    Ok(())
}

/// Reads and writes the value layout selected by a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAccessor {
    root: MemoryLayout,
    layout: ValueLayout,
    offsets: OffsetHandle,
    derefs: Vec<ValueAccessor>,
}

impl ValueAccessor {
    pub(crate) fn new(root: MemoryLayout, layout: ValueLayout, offsets: OffsetHandle) -> Self {
        Self {
            root,
            layout,
            offsets,
            derefs: Vec::new(),
        }
    }

    pub(crate) fn with_derefs(mut self, derefs: Vec<ValueAccessor>) -> Self {
        self.derefs = derefs;
        self
    }

    pub fn layout(&self) -> &ValueLayout {
        &self.layout
    }

    /// Number of dynamic indices `get`/`set` expect.
    pub fn coordinate_count(&self) -> usize {
        self.offsets.coordinate_count()
            + self
                .derefs
                .iter()
                .map(ValueAccessor::coordinate_count)
                .sum::<usize>()
    }

    pub fn get(&self, segment: &MemorySegment, base: u64, indices: &[i64]) -> Result<Value, LayoutError> {
        let (target, offset) = self.resolve(segment, base, indices)?;
        Ok(target.get(&self.layout, offset)?)
    }

    pub fn set(&self, segment: &MemorySegment, base: u64, indices: &[i64], value: Value) -> Result<(), LayoutError> {
        let (target, offset) = self.resolve(segment, base, indices)?;
        Ok(target.set(&self.layout, offset, value)?)
    }

    /// Follow the pointer hops, then compute this accessor's own offset.
    fn resolve(
        &self,
        segment: &MemorySegment,
        base: u64,
        indices: &[i64],
    ) -> Result<(MemorySegment, u64), LayoutError> {
        let expected = self.coordinate_count();
        if indices.len() != expected {
            return Err(LayoutError::CoordinateCount {
                expected,
                got: indices.len(),
            });
        }
        let mut current = segment.clone();
        let mut base = base;
        let mut rest = indices;
        for hop in &self.derefs {
            let (own, tail) = rest.split_at_checked(hop.coordinate_count()).ok_or(
                LayoutError::CoordinateCount {
                    expected,
                    got: indices.len(),
                },
            )?;
            let pointer = hop.get(&current, base, own)?;
            let address = pointer.as_address().ok_or(LayoutError::NotAValueLayout(
                hop.layout.to_string(),
            ))?;
            current = current.memory().unbounded(address)?;
            base = 0;
            rest = tail;
        }
        current.check_enclosing_layout(base, &self.root)?;
        let offset = self.offsets.compute(base, rest)?;
        Ok((current, offset))
    }
}

/// Produces sub-segments for the layout selected by a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHandle {
    layout: MemoryLayout,
    root: MemoryLayout,
    offsets: OffsetHandle,
    nested: bool,
}

impl SliceHandle {
    pub(crate) fn new(layout: MemoryLayout, root: MemoryLayout, offsets: OffsetHandle, nested: bool) -> Self {
        Self {
            layout,
            root,
            offsets,
            nested,
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn coordinate_count(&self) -> usize {
        self.offsets.coordinate_count()
    }

    /// Slice of `segment` covering the selected layout.
    ///
    /// For a nested path the root layout must fit at `base` first, so the
    /// slice can never reach outside the root.
    pub fn slice(&self, segment: &MemorySegment, base: u64, indices: &[i64]) -> Result<MemorySegment, LayoutError> {
        if self.nested {
            segment.check_enclosing_layout(base, &self.root)?;
            let offset = self.offsets.compute(base, indices)?;
            Ok(segment.as_slice(offset, self.layout.byte_size())?)
        } else {
            let offset = self.offsets.compute(base, indices)?;
            Ok(segment.as_slice_layout(offset, &self.layout)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PathElement;
    use crate::memory::{Arena, MemoryError};

    fn matrix() -> MemoryLayout {
        let row = MemoryLayout::sequence_layout(3, ValueLayout::INT.into()).unwrap();
        MemoryLayout::sequence_layout(2, row).unwrap()
    }

    #[test]
    fn test_offset_handle_checks_bounds() {
        let handle = OffsetHandle::new(4, vec![8], vec![3]);
        assert_eq!(handle.compute(0, &[2]).unwrap(), 20);
        assert!(matches!(
            handle.compute(0, &[3]),
            Err(LayoutError::IndexOutOfBounds { index: 3, bound: 3 })
        ));
        assert!(matches!(
            handle.compute(0, &[]),
            Err(LayoutError::CoordinateCount { expected: 1, got: 0 })
        ));
    }

    #[test]
    fn test_offset_overflow_is_reported() {
        let handle = OffsetHandle::new(4, vec![i64::MAX], vec![i64::MAX]);
        assert!(matches!(handle.compute(0, &[2]), Err(LayoutError::OffsetOverflow)));
        let handle = OffsetHandle::new(4, vec![], vec![]);
        assert!(matches!(handle.compute(u64::MAX, &[]), Err(LayoutError::OffsetOverflow)));
    }

    #[test]
    fn test_accessor_walks_matrix() {
        let layout = matrix();
        let arena = Arena::new();
        let segment = arena.allocate_layout(&layout).unwrap();
        let cell = layout
            .var_handle(&[PathElement::sequence_element(), PathElement::sequence_element()])
            .unwrap();
        cell.set(&segment, 0, &[1, 2], Value::Int(42)).unwrap();
        assert_eq!(segment.get(&ValueLayout::INT, 20).unwrap(), Value::Int(42));
        assert_eq!(cell.get(&segment, 0, &[1, 2]).unwrap(), Value::Int(42));
        assert!(cell.get(&segment, 0, &[2, 0]).is_err());
    }

    #[test]
    fn test_accessor_checks_root_fits() {
        let layout = matrix();
        let arena = Arena::new();
        let segment = arena.allocate(8, 4).unwrap();
        let cell = layout
            .var_handle(&[PathElement::sequence_index(0).unwrap(), PathElement::sequence_index(0).unwrap()])
            .unwrap();
        assert!(matches!(
            cell.get(&segment, 0, &[]),
            Err(LayoutError::Memory(MemoryError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_slice_handle_nested() {
        let layout = matrix();
        let arena = Arena::new();
        let segment = arena.allocate_layout(&layout).unwrap();
        let rows = layout.slice_handle(&[PathElement::sequence_element()]).unwrap();
        let row = rows.slice(&segment, 0, &[1]).unwrap();
        assert_eq!(row.byte_size(), 12);
        assert_eq!(row.address(), segment.address() + 12);
    }
}
