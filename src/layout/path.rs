//! Layout paths.
//!
//! A [`LayoutPath`] starts at a root layout and is extended one selector at a
//! time. Each step yields a new immutable path that links back to the path it
//! was selected from, so a finished path can describe the full chain of
//! layouts it traversed when an error is reported.
//!
//! A path tracks:
//! - the layout selected so far and its constant byte offset;
//! - one stride/bound pair per open sequence index, to be supplied as a
//!   coordinate when the path is turned into a handle;
//! - one dereference hop per pointer crossed, applied outermost first.

use std::fmt;
use std::sync::Arc;

use super::handle::{OffsetHandle, SliceHandle, ValueAccessor};
use super::{Carrier, LayoutError, MemoryLayout, SequenceLayout};

/// One selector in a layout path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Open sequence element; the index is supplied later as a coordinate.
    SequenceElement,
    /// Fixed sequence element.
    SequenceIndex(i64),
    /// Open sequence element over `start, start + step, ...`.
    SequenceRange { start: i64, step: i64 },
    GroupName(String),
    GroupIndex(i64),
    /// Follow an address layout to its target layout.
    Dereference,
}

impl PathElement {
    pub fn sequence_element() -> Self {
        PathElement::SequenceElement
    }

    pub fn sequence_index(index: i64) -> Result<Self, LayoutError> {
        if index < 0 {
            return Err(LayoutError::InvalidPathElement("Index < 0".to_string()));
        }
        Ok(PathElement::SequenceIndex(index))
    }

    pub fn sequence_range(start: i64, step: i64) -> Result<Self, LayoutError> {
        if start < 0 {
            return Err(LayoutError::InvalidPathElement(format!(
                "Start index must be positive: {}",
                start
            )));
        }
        if step == 0 {
            return Err(LayoutError::InvalidPathElement(format!(
                "Step must be != 0: {}",
                step
            )));
        }
        Ok(PathElement::SequenceRange { start, step })
    }

    pub fn group_name(name: impl Into<String>) -> Self {
        PathElement::GroupName(name.into())
    }

    pub fn group_index(index: i64) -> Result<Self, LayoutError> {
        if index < 0 {
            return Err(LayoutError::InvalidPathElement("Index < 0".to_string()));
        }
        Ok(PathElement::GroupIndex(index))
    }

    pub fn dereference() -> Self {
        PathElement::Dereference
    }

    /// True for selectors that add a coordinate to derived handles.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PathElement::SequenceElement | PathElement::SequenceRange { .. }
        )
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::SequenceElement => write!(f, "sequenceElement()"),
            PathElement::SequenceIndex(i) => write!(f, "sequenceElement({})", i),
            PathElement::SequenceRange { start, step } => {
                write!(f, "sequenceElement({}, {})", start, step)
            }
            PathElement::GroupName(name) => write!(f, "groupElement(\"{}\")", name),
            PathElement::GroupIndex(i) => write!(f, "groupElement({})", i),
            PathElement::Dereference => write!(f, "dereferenceElement()"),
        }
    }
}

#[derive(Debug)]
struct PathNode {
    layout: MemoryLayout,
    offset: i64,
    strides: Vec<i64>,
    bounds: Vec<i64>,
    derefs: Vec<ValueAccessor>,
    enclosing: Option<LayoutPath>,
}

/// An immutable position inside a root layout.
#[derive(Debug, Clone)]
pub struct LayoutPath {
    node: Arc<PathNode>,
}

impl LayoutPath {
    pub fn root(layout: MemoryLayout) -> Self {
        Self {
            node: Arc::new(PathNode {
                layout,
                offset: 0,
                strides: Vec::new(),
                bounds: Vec::new(),
                derefs: Vec::new(),
                enclosing: None,
            }),
        }
    }

    fn nested(&self, layout: MemoryLayout, offset: i64, strides: Vec<i64>, bounds: Vec<i64>) -> Self {
        Self {
            node: Arc::new(PathNode {
                layout,
                offset,
                strides,
                bounds,
                derefs: self.node.derefs.clone(),
                enclosing: Some(self.clone()),
            }),
        }
    }

    pub fn apply(&self, element: &PathElement) -> Result<LayoutPath, LayoutError> {
        match element {
            PathElement::SequenceElement => self.sequence_element(),
            PathElement::SequenceIndex(index) => self.sequence_element_at(*index),
            PathElement::SequenceRange { start, step } => {
                self.sequence_element_range(*start, *step)
            }
            PathElement::GroupName(name) => self.group_element(name),
            PathElement::GroupIndex(index) => self.group_element_at(*index),
            PathElement::Dereference => self.deref_element(),
        }
    }

    /// Open element of the current sequence, at the same base offset.
    pub fn sequence_element(&self) -> Result<LayoutPath, LayoutError> {
        let seq = self.require_sequence()?;
        let elem = seq.element_layout().clone();
        let stride = to_i64(elem.byte_size())?;
        let bound = to_i64(seq.element_count())?;
        Ok(self.nested(
            elem,
            self.node.offset,
            push(&self.node.strides, stride),
            push(&self.node.bounds, bound),
        ))
    }

    /// Open element over `start, start + step, ...` of the current sequence.
    pub fn sequence_element_range(&self, start: i64, step: i64) -> Result<LayoutPath, LayoutError> {
        let seq = self.require_sequence()?;
        if step == 0 {
            return Err(LayoutError::InvalidPathElement(format!(
                "Step must be != 0: {}",
                step
            )));
        }
        self.check_sequence_bounds(seq, start)?;
        let elem = seq.element_layout().clone();
        let elem_size = to_i64(elem.byte_size())?;
        let count = to_i64(seq.element_count())?;
        let reachable = if step > 0 { count - start } else { start + 1 };
        let max_index = ceil_div(reachable, step.unsigned_abs());
        let offset = start
            .checked_mul(elem_size)
            .and_then(|o| o.checked_add(self.node.offset))
            .ok_or(LayoutError::OffsetOverflow)?;
        let stride = elem_size.checked_mul(step).ok_or(LayoutError::OffsetOverflow)?;
        Ok(self.nested(
            elem,
            offset,
            push(&self.node.strides, stride),
            push(&self.node.bounds, max_index),
        ))
    }

    /// Fixed element `index` of the current sequence.
    pub fn sequence_element_at(&self, index: i64) -> Result<LayoutPath, LayoutError> {
        let seq = self.require_sequence()?;
        self.check_sequence_bounds(seq, index)?;
        let elem = seq.element_layout().clone();
        let offset = to_i64(elem.byte_size())?
            .checked_mul(index)
            .and_then(|o| o.checked_add(self.node.offset))
            .ok_or(LayoutError::OffsetOverflow)?;
        Ok(self.nested(
            elem,
            offset,
            self.node.strides.clone(),
            self.node.bounds.clone(),
        ))
    }

    /// Member of the current group with the given name.
    pub fn group_element(&self, name: &str) -> Result<LayoutPath, LayoutError> {
        let group = self.require_group()?;
        let found = group
            .member_offsets()
            .find(|(_, member)| member.name() == Some(name));
        match found {
            Some((offset, member)) => self.group_member(member.clone(), offset),
            None => Err(self.bad_path(format!(
                "cannot resolve '{}' in layout {}",
                name,
                self.breadcrumbs()
            ))),
        }
    }

    /// Member of the current group at position `index`.
    pub fn group_element_at(&self, index: i64) -> Result<LayoutPath, LayoutError> {
        let group = self.require_group()?;
        let found = usize::try_from(index)
            .ok()
            .and_then(|i| group.member_offsets().nth(i));
        match found {
            Some((offset, member)) => self.group_member(member.clone(), offset),
            None => Err(self.bad_path(format!(
                "cannot resolve element {} in layout: {}",
                index,
                self.breadcrumbs()
            ))),
        }
    }

    fn group_member(&self, member: MemoryLayout, offset: u64) -> Result<LayoutPath, LayoutError> {
        let offset = to_i64(offset)?
            .checked_add(self.node.offset)
            .ok_or(LayoutError::OffsetOverflow)?;
        Ok(self.nested(
            member,
            offset,
            self.node.strides.clone(),
            self.node.bounds.clone(),
        ))
    }

    /// Follow the current address layout to its target.
    ///
    /// The result is a new root at offset 0: the pointer value is read at
    /// access time and the target is viewed without a size bound.
    pub fn deref_element(&self) -> Result<LayoutPath, LayoutError> {
        let target = match &self.node.layout {
            MemoryLayout::Value(v) if v.carrier() == Carrier::Address => v.target_layout().cloned(),
            _ => None,
        };
        let Some(target) = target else {
            return Err(self.bad_path(format!(
                "Cannot dereference layout: {}",
                self.breadcrumbs()
            )));
        };
        let hop = self.direct_accessor()?;
        let mut derefs = self.node.derefs.clone();
        derefs.push(hop);
        Ok(Self {
            node: Arc::new(PathNode {
                layout: target,
                offset: 0,
                strides: Vec::new(),
                bounds: Vec::new(),
                derefs,
                enclosing: None,
            }),
        })
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.node.layout
    }

    /// The layout at the start of the current dereference hop.
    pub fn root_layout(&self) -> &MemoryLayout {
        let mut path = self;
        while let Some(enclosing) = &path.node.enclosing {
            path = enclosing;
        }
        &path.node.layout
    }

    /// Number of coordinates a handle derived from this path consumes.
    pub fn coordinate_count(&self) -> usize {
        self.node.strides.len()
            + self
                .node
                .derefs
                .iter()
                .map(ValueAccessor::coordinate_count)
                .sum::<usize>()
    }

    /// Constant byte offset of the selected layout.
    ///
    /// Fails when the path still has open sequence elements or crosses a
    /// pointer, because neither has a constant offset.
    pub fn offset(&self) -> Result<u64, LayoutError> {
        if !self.node.strides.is_empty() || !self.node.derefs.is_empty() {
            return Err(self.bad_path(format!(
                "path has open elements or dereferences: {}",
                self.breadcrumbs()
            )));
        }
        u64::try_from(self.node.offset).map_err(|_| LayoutError::OffsetOverflow)
    }

    pub fn offset_handle(&self) -> OffsetHandle {
        OffsetHandle::new(
            self.node.offset,
            self.node.strides.clone(),
            self.node.bounds.clone(),
        )
    }

    /// Accessor for the selected value layout, with every dereference hop
    /// composed in front of it.
    pub fn accessor(&self) -> Result<ValueAccessor, LayoutError> {
        Ok(self.direct_accessor()?.with_derefs(self.node.derefs.clone()))
    }

    fn direct_accessor(&self) -> Result<ValueAccessor, LayoutError> {
        let MemoryLayout::Value(value) = &self.node.layout else {
            return Err(LayoutError::NotAValueLayout(self.breadcrumbs()));
        };
        Ok(ValueAccessor::new(
            self.root_layout().clone(),
            value.clone(),
            self.offset_handle(),
        ))
    }

    pub fn slice_handle(&self) -> SliceHandle {
        SliceHandle::new(
            self.node.layout.clone(),
            self.root_layout().clone(),
            self.offset_handle(),
            self.node.enclosing.is_some(),
        )
    }

    fn require_sequence(&self) -> Result<&SequenceLayout, LayoutError> {
        match &self.node.layout {
            MemoryLayout::Sequence(seq) => Ok(seq),
            _ => Err(self.wrong_kind("sequence")),
        }
    }

    fn require_group(&self) -> Result<&super::GroupLayout, LayoutError> {
        match &self.node.layout {
            MemoryLayout::Group(group) => Ok(group),
            _ => Err(self.wrong_kind("group")),
        }
    }

    fn wrong_kind(&self, kind: &str) -> LayoutError {
        self.bad_path(format!(
            "attempting to select a {} element from a non-{} layout: {}",
            kind,
            kind,
            self.breadcrumbs()
        ))
    }

    fn check_sequence_bounds(&self, seq: &SequenceLayout, index: i64) -> Result<(), LayoutError> {
        let in_bounds = u64::try_from(index).is_ok_and(|i| i < seq.element_count());
        if !in_bounds {
            return Err(self.bad_path(format!(
                "sequence index out of bounds; index: {}, elementCount is {} for layout {}",
                index,
                seq.element_count(),
                self.breadcrumbs()
            )));
        }
        Ok(())
    }

    fn bad_path(&self, cause: String) -> LayoutError {
        LayoutError::BadLayoutPath(cause)
    }

    /// `layout, selected from: enclosing, selected from: ...`
    pub fn breadcrumbs(&self) -> String {
        let mut crumbs = vec![self.node.layout.to_string()];
        let mut current = &self.node.enclosing;
        while let Some(path) = current {
            crumbs.push(path.node.layout.to_string());
            current = &path.node.enclosing;
        }
        crumbs.join(", selected from: ")
    }
}

fn push(values: &[i64], value: i64) -> Vec<i64> {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.extend_from_slice(values);
    out.push(value);
    out
}

fn ceil_div(value: i64, divisor: u64) -> i64 {
    let value = value.unsigned_abs();
    i64::try_from(value.div_ceil(divisor)).unwrap_or(i64::MAX)
}

fn to_i64(value: u64) -> Result<i64, LayoutError> {
    i64::try_from(value).map_err(|_| LayoutError::OffsetOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ValueLayout;

    fn ints(n: u64) -> MemoryLayout {
        MemoryLayout::sequence_layout(n, ValueLayout::INT.into()).unwrap()
    }

    fn triple() -> MemoryLayout {
        MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::BYTE.with_name("a")),
            MemoryLayout::padding_layout(3).unwrap(),
            MemoryLayout::from(ValueLayout::INT.with_name("b")),
            MemoryLayout::from(ValueLayout::LONG.with_name("c")),
        ])
        .unwrap()
    }

    #[test]
    fn test_group_element_by_name_accumulates_offsets() {
        let root = LayoutPath::root(triple());
        assert_eq!(root.group_element("a").unwrap().offset().unwrap(), 0);
        assert_eq!(root.group_element("b").unwrap().offset().unwrap(), 4);
        assert_eq!(root.group_element("c").unwrap().offset().unwrap(), 8);
    }

    #[test]
    fn test_group_element_by_index_counts_padding() {
        let root = LayoutPath::root(triple());
        assert_eq!(root.group_element_at(2).unwrap().offset().unwrap(), 4);
        assert!(root.group_element_at(4).is_err());
        assert!(root.group_element_at(-1).is_err());
    }

    #[test]
    fn test_unknown_member_reports_breadcrumbs() {
        let nested = MemoryLayout::struct_layout([triple().with_name("inner")]).unwrap();
        let err = LayoutPath::root(nested)
            .group_element("inner")
            .unwrap()
            .group_element("zzz")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Bad layout path: cannot resolve 'zzz'"));
        assert!(message.contains("selected from:"));
    }

    #[test]
    fn test_sequence_index_bounds() {
        let root = LayoutPath::root(ints(4));
        assert_eq!(root.sequence_element_at(3).unwrap().offset().unwrap(), 12);
        assert!(root.sequence_element_at(4).is_err());
        assert!(root.sequence_element_at(-1).is_err());
    }

    #[test]
    fn test_open_sequence_has_no_constant_offset() {
        let path = LayoutPath::root(ints(4)).sequence_element().unwrap();
        assert_eq!(path.coordinate_count(), 1);
        assert!(path.offset().is_err());
    }

    #[test]
    fn test_sequence_range_bounds() {
        let root = LayoutPath::root(ints(10));
        let forward = root.sequence_element_range(1, 3).unwrap();
        assert_eq!(forward.offset_handle().bounds(), &[3]);
        let backward = root.sequence_element_range(9, -2).unwrap();
        assert_eq!(backward.offset_handle().bounds(), &[5]);
        assert_eq!(backward.offset_handle().strides(), &[-8]);
        assert!(root.sequence_element_range(10, 1).is_err());
    }

    #[test]
    fn test_selecting_from_wrong_kind_fails() {
        let root = LayoutPath::root(ValueLayout::INT.into());
        assert!(matches!(
            root.group_element("x"),
            Err(LayoutError::BadLayoutPath(m)) if m.contains("non-group")
        ));
        assert!(root.sequence_element().is_err());
        assert!(root.deref_element().is_err());
    }

    #[test]
    fn test_deref_starts_new_root() {
        let pointer = ValueLayout::ADDRESS.with_target_layout(triple()).unwrap();
        let path = LayoutPath::root(pointer.into())
            .deref_element()
            .unwrap()
            .group_element("c")
            .unwrap();
        assert_eq!(path.root_layout(), &triple());
        assert!(path.offset().is_err());
        assert!(path.accessor().is_ok());
    }

    #[test]
    fn test_path_element_validation() {
        assert!(PathElement::sequence_index(-1).is_err());
        assert!(PathElement::sequence_range(-1, 1).is_err());
        assert!(PathElement::sequence_range(0, 0).is_err());
        assert_eq!(
            PathElement::sequence_range(1, 2).unwrap().to_string(),
            "sequenceElement(1, 2)"
        );
    }
}
