//! Native memory layouts.
//!
//! A [`MemoryLayout`] describes the shape of a block of native memory
//! independently of any particular memory instance: scalar value layouts,
//! sequences (arrays), groups (structs and unions) and padding.
//!
//! Layouts are immutable values. Cloning is cheap because nested layouts are
//! shared behind `Arc`.
//!
//! # Module Organization
//!
//! - [`path`]: layout paths and path elements
//! - [`handle`]: accessor, offset and slice handles derived from a path
//! - `parse`: the compact textual descriptor accepted by [`MemoryLayout::from_str`]
//!
//! [`MemoryLayout::from_str`]: std::str::FromStr

mod error;
pub mod handle;
mod parse;
pub mod path;

pub use error::LayoutError;
pub use handle::{OffsetHandle, SliceHandle, ValueAccessor};
pub use path::{LayoutPath, PathElement};
pub(crate) use parse::parse_signature;

use std::fmt;
use std::sync::Arc;

/// Size in bytes of a native pointer on every supported target.
pub const ADDRESS_SIZE: u64 = 8;

/// Byte order of a value layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host this crate was compiled for.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

/// The kind of value carried by a [`ValueLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Carrier {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Address,
}

impl Carrier {
    pub const fn byte_size(self) -> u64 {
        match self {
            Carrier::Bool | Carrier::Byte => 1,
            Carrier::Char | Carrier::Short => 2,
            Carrier::Int | Carrier::Float => 4,
            Carrier::Long | Carrier::Double => 8,
            Carrier::Address => ADDRESS_SIZE,
        }
    }

    /// Single-letter descriptor used in layout strings.
    pub const fn descriptor(self) -> char {
        match self {
            Carrier::Bool => 'z',
            Carrier::Byte => 'b',
            Carrier::Char => 'c',
            Carrier::Short => 's',
            Carrier::Int => 'i',
            Carrier::Long => 'j',
            Carrier::Float => 'f',
            Carrier::Double => 'd',
            Carrier::Address => 'a',
        }
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'z' => Some(Carrier::Bool),
            'b' => Some(Carrier::Byte),
            'c' => Some(Carrier::Char),
            's' => Some(Carrier::Short),
            'i' => Some(Carrier::Int),
            'j' => Some(Carrier::Long),
            'f' => Some(Carrier::Float),
            'd' => Some(Carrier::Double),
            'a' => Some(Carrier::Address),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Carrier::Bool => "boolean",
            Carrier::Byte => "byte",
            Carrier::Char => "char",
            Carrier::Short => "short",
            Carrier::Int => "int",
            Carrier::Long => "long",
            Carrier::Float => "float",
            Carrier::Double => "double",
            Carrier::Address => "address",
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, Carrier::Float | Carrier::Double)
    }
}

/// A scalar layout: fixed size, alignment, byte order and carrier.
///
/// Address layouts may carry a target layout, which is what a
/// [`PathElement::Dereference`] step selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueLayout {
    carrier: Carrier,
    order: ByteOrder,
    alignment: u64,
    name: Option<Arc<str>>,
    target: Option<Arc<MemoryLayout>>,
}

impl ValueLayout {
    pub const BOOL: ValueLayout = ValueLayout::of(Carrier::Bool);
    pub const BYTE: ValueLayout = ValueLayout::of(Carrier::Byte);
    pub const CHAR: ValueLayout = ValueLayout::of(Carrier::Char);
    pub const SHORT: ValueLayout = ValueLayout::of(Carrier::Short);
    pub const INT: ValueLayout = ValueLayout::of(Carrier::Int);
    pub const LONG: ValueLayout = ValueLayout::of(Carrier::Long);
    pub const FLOAT: ValueLayout = ValueLayout::of(Carrier::Float);
    pub const DOUBLE: ValueLayout = ValueLayout::of(Carrier::Double);
    pub const ADDRESS: ValueLayout = ValueLayout::of(Carrier::Address);

    /// Naturally aligned, native byte order layout for `carrier`.
    pub const fn of(carrier: Carrier) -> Self {
        Self {
            carrier,
            order: ByteOrder::native(),
            alignment: carrier.byte_size(),
            name: None,
            target: None,
        }
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn byte_size(&self) -> u64 {
        self.carrier.byte_size()
    }

    pub fn byte_alignment(&self) -> u64 {
        self.alignment
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The layout this address points to, if any.
    pub fn target_layout(&self) -> Option<&MemoryLayout> {
        self.target.as_deref()
    }

    pub fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn without_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn with_byte_alignment(mut self, alignment: u64) -> Result<Self, LayoutError> {
        check_alignment(alignment)?;
        self.alignment = alignment;
        Ok(self)
    }

    /// Attach a target layout to an address layout.
    pub fn with_target_layout(mut self, target: MemoryLayout) -> Result<Self, LayoutError> {
        if self.carrier != Carrier::Address {
            return Err(LayoutError::InvalidPathElement(format!(
                "target layout on non-address layout {}",
                self
            )));
        }
        self.target = Some(Arc::new(target));
        Ok(self)
    }

    pub fn without_target_layout(mut self) -> Self {
        self.target = None;
        self
    }
}

/// Struct or union flavour of a [`GroupLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Members laid out one after the other.
    Struct,
    /// Members overlap at offset 0.
    Union,
}

/// A struct or union of member layouts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupLayout {
    kind: GroupKind,
    members: Arc<[MemoryLayout]>,
    size: u64,
    alignment: u64,
    name: Option<Arc<str>>,
}

impl GroupLayout {
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn is_struct(&self) -> bool {
        self.kind == GroupKind::Struct
    }

    pub fn members(&self) -> &[MemoryLayout] {
        &self.members
    }

    pub fn byte_size(&self) -> u64 {
        self.size
    }

    pub fn byte_alignment(&self) -> u64 {
        self.alignment
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Members paired with their byte offset inside the group.
    pub fn member_offsets(&self) -> impl Iterator<Item = (u64, &MemoryLayout)> + '_ {
        let kind = self.kind;
        self.members.iter().scan(0u64, move |next, member| {
            let offset = match kind {
                GroupKind::Struct => *next,
                GroupKind::Union => 0,
            };
            *next = next.saturating_add(member.byte_size());
            Some((offset, member))
        })
    }
}

/// `count` repetitions of an element layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceLayout {
    element: Arc<MemoryLayout>,
    count: u64,
    size: u64,
    alignment: u64,
    name: Option<Arc<str>>,
}

impl SequenceLayout {
    pub fn element_layout(&self) -> &MemoryLayout {
        &self.element
    }

    pub fn element_count(&self) -> u64 {
        self.count
    }

    pub fn byte_size(&self) -> u64 {
        self.size
    }

    pub fn byte_alignment(&self) -> u64 {
        self.alignment
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Unnamed filler bytes inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaddingLayout {
    size: u64,
    name: Option<Arc<str>>,
}

impl PaddingLayout {
    pub fn byte_size(&self) -> u64 {
        self.size
    }
}

/// Shape of a block of native memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryLayout {
    Value(ValueLayout),
    Sequence(SequenceLayout),
    Group(GroupLayout),
    Padding(PaddingLayout),
}

impl MemoryLayout {
    /// A struct whose members follow each other in declaration order.
    ///
    /// No implicit padding is inserted: every member must already sit at an
    /// offset that satisfies its alignment.
    pub fn struct_layout(
        members: impl IntoIterator<Item = MemoryLayout>,
    ) -> Result<Self, LayoutError> {
        let members: Arc<[MemoryLayout]> = members.into_iter().collect();
        let mut size = 0u64;
        let mut alignment = 1u64;
        for member in members.iter() {
            let member_align = member.byte_alignment();
            if size % member_align != 0 {
                return Err(LayoutError::MisalignedMember {
                    member: member.to_string(),
                    offset: size,
                });
            }
            size = size
                .checked_add(member.byte_size())
                .ok_or_else(|| LayoutError::SizeOverflow("struct layout".to_string()))?;
            alignment = alignment.max(member_align);
        }
        Ok(MemoryLayout::Group(GroupLayout {
            kind: GroupKind::Struct,
            members,
            size,
            alignment,
            name: None,
        }))
    }

    /// A union whose members all start at offset 0.
    pub fn union_layout(members: impl IntoIterator<Item = MemoryLayout>) -> Self {
        let members: Arc<[MemoryLayout]> = members.into_iter().collect();
        let size = members.iter().map(MemoryLayout::byte_size).max().unwrap_or(0);
        let alignment = members
            .iter()
            .map(MemoryLayout::byte_alignment)
            .max()
            .unwrap_or(1);
        MemoryLayout::Group(GroupLayout {
            kind: GroupKind::Union,
            members,
            size,
            alignment,
            name: None,
        })
    }

    pub fn sequence_layout(count: u64, element: MemoryLayout) -> Result<Self, LayoutError> {
        let size = element.byte_size().checked_mul(count).ok_or_else(|| {
            LayoutError::SizeOverflow(format!("{} elements of {}", count, element))
        })?;
        if element.byte_size() % element.byte_alignment() != 0 {
            return Err(LayoutError::MisalignedMember {
                member: element.to_string(),
                offset: element.byte_size(),
            });
        }
        Ok(MemoryLayout::Sequence(SequenceLayout {
            alignment: element.byte_alignment(),
            element: Arc::new(element),
            count,
            size,
            name: None,
        }))
    }

    pub fn padding_layout(size: u64) -> Result<Self, LayoutError> {
        if size == 0 {
            return Err(LayoutError::SizeOverflow(
                "padding layout must have a positive size".to_string(),
            ));
        }
        Ok(MemoryLayout::Padding(PaddingLayout { size, name: None }))
    }

    pub fn byte_size(&self) -> u64 {
        match self {
            MemoryLayout::Value(v) => v.byte_size(),
            MemoryLayout::Sequence(s) => s.size,
            MemoryLayout::Group(g) => g.size,
            MemoryLayout::Padding(p) => p.size,
        }
    }

    pub fn byte_alignment(&self) -> u64 {
        match self {
            MemoryLayout::Value(v) => v.alignment,
            MemoryLayout::Sequence(s) => s.alignment,
            MemoryLayout::Group(g) => g.alignment,
            MemoryLayout::Padding(_) => 1,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            MemoryLayout::Value(v) => v.name.as_deref(),
            MemoryLayout::Sequence(s) => s.name.as_deref(),
            MemoryLayout::Group(g) => g.name.as_deref(),
            MemoryLayout::Padding(p) => p.name.as_deref(),
        }
    }

    pub fn with_name(self, name: impl Into<Arc<str>>) -> Self {
        let name = Some(name.into());
        match self {
            MemoryLayout::Value(mut v) => {
                v.name = name;
                MemoryLayout::Value(v)
            }
            MemoryLayout::Sequence(mut s) => {
                s.name = name;
                MemoryLayout::Sequence(s)
            }
            MemoryLayout::Group(mut g) => {
                g.name = name;
                MemoryLayout::Group(g)
            }
            MemoryLayout::Padding(mut p) => {
                p.name = name;
                MemoryLayout::Padding(p)
            }
        }
    }

    /// Override the alignment. Groups and sequences may not be aligned below
    /// the alignment their members require.
    pub fn with_byte_alignment(self, alignment: u64) -> Result<Self, LayoutError> {
        check_alignment(alignment)?;
        match self {
            MemoryLayout::Value(v) => Ok(MemoryLayout::Value(v.with_byte_alignment(alignment)?)),
            MemoryLayout::Group(mut g) => {
                let required = g.members.iter().map(MemoryLayout::byte_alignment).max();
                if required.is_some_and(|r| alignment < r) {
                    return Err(LayoutError::InvalidAlignment(alignment));
                }
                g.alignment = alignment;
                Ok(MemoryLayout::Group(g))
            }
            MemoryLayout::Sequence(mut s) => {
                if alignment < s.element.byte_alignment() {
                    return Err(LayoutError::InvalidAlignment(alignment));
                }
                s.alignment = alignment;
                Ok(MemoryLayout::Sequence(s))
            }
            MemoryLayout::Padding(p) => Ok(MemoryLayout::Padding(p)),
        }
    }

    pub fn as_value(&self) -> Option<&ValueLayout> {
        match self {
            MemoryLayout::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupLayout> {
        match self {
            MemoryLayout::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceLayout> {
        match self {
            MemoryLayout::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Every scalar leaf with its byte offset, in memory order. Padding is
    /// skipped and sequences are expanded element by element.
    pub fn scalar_fields(&self) -> Vec<(u64, ValueLayout)> {
        let mut out = Vec::new();
        collect_scalars(self, 0, &mut out);
        out
    }

    /// Resolve a whole path from this layout as root.
    pub fn select(&self, elements: &[PathElement]) -> Result<LayoutPath, LayoutError> {
        elements
            .iter()
            .try_fold(LayoutPath::root(self.clone()), |path, element| {
                path.apply(element)
            })
    }

    /// Constant byte offset of the layout selected by `elements`.
    pub fn byte_offset(&self, elements: &[PathElement]) -> Result<u64, LayoutError> {
        self.select(elements)?.offset()
    }

    /// Accessor for the value layout selected by `elements`.
    pub fn var_handle(&self, elements: &[PathElement]) -> Result<ValueAccessor, LayoutError> {
        self.select(elements)?.accessor()
    }

    /// Handle producing sub-segments for the layout selected by `elements`.
    pub fn slice_handle(&self, elements: &[PathElement]) -> Result<SliceHandle, LayoutError> {
        Ok(self.select(elements)?.slice_handle())
    }
}

impl From<ValueLayout> for MemoryLayout {
    fn from(layout: ValueLayout) -> Self {
        MemoryLayout::Value(layout)
    }
}

fn collect_scalars(layout: &MemoryLayout, base: u64, out: &mut Vec<(u64, ValueLayout)>) {
    match layout {
        MemoryLayout::Value(v) => out.push((base, v.clone())),
        MemoryLayout::Group(g) => {
            for (offset, member) in g.member_offsets() {
                collect_scalars(member, base.saturating_add(offset), out);
            }
        }
        MemoryLayout::Sequence(s) => {
            let stride = s.element.byte_size();
            for i in 0..s.count {
                collect_scalars(&s.element, base.saturating_add(stride.saturating_mul(i)), out);
            }
        }
        MemoryLayout::Padding(_) => {}
    }
}

fn check_alignment(alignment: u64) -> Result<(), LayoutError> {
    if alignment == 0 || !alignment.is_power_of_two() {
        return Err(LayoutError::InvalidAlignment(alignment));
    }
    Ok(())
}

fn write_name(f: &mut fmt::Formatter<'_>, name: Option<&str>) -> fmt::Result {
    match name {
        Some(n) => write!(f, "({})", n),
        None => Ok(()),
    }
}

impl fmt::Display for ValueLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptor = match self.order {
            ByteOrder::LittleEndian => self.carrier.descriptor(),
            ByteOrder::BigEndian => self.carrier.descriptor().to_ascii_uppercase(),
        };
        write!(f, "{}{}", descriptor, self.byte_size())?;
        if self.alignment != self.byte_size() {
            write!(f, "%{}", self.alignment)?;
        }
        write_name(f, self.name())?;
        if let Some(target) = &self.target {
            write!(f, ":{}", target)?;
        }
        Ok(())
    }
}

impl fmt::Display for MemoryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryLayout::Value(v) => v.fmt(f),
            MemoryLayout::Sequence(s) => {
                write!(f, "[{}:{}]", s.count, s.element)?;
                write_name(f, s.name())
            }
            MemoryLayout::Group(g) => {
                let separator = match g.kind {
                    GroupKind::Struct => "",
                    GroupKind::Union => "|",
                };
                write!(f, "[")?;
                for (i, member) in g.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", separator)?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "]")?;
                write_name(f, g.name())
            }
            MemoryLayout::Padding(p) => {
                write!(f, "x{}", p.size)?;
                write_name(f, p.name.as_deref())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> MemoryLayout {
        MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::INT.with_name("x")),
            MemoryLayout::from(ValueLayout::INT.with_name("y")),
        ])
        .unwrap()
        .with_name("point")
    }

    #[test]
    fn test_struct_size_and_alignment() {
        let layout = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::INT),
            MemoryLayout::padding_layout(4).unwrap(),
            MemoryLayout::from(ValueLayout::DOUBLE),
        ])
        .unwrap();
        assert_eq!(layout.byte_size(), 16);
        assert_eq!(layout.byte_alignment(), 8);
    }

    #[test]
    fn test_struct_rejects_misaligned_member() {
        let err = MemoryLayout::struct_layout([
            MemoryLayout::from(ValueLayout::INT),
            MemoryLayout::from(ValueLayout::DOUBLE),
        ])
        .unwrap_err();
        assert!(matches!(err, LayoutError::MisalignedMember { offset: 4, .. }));
    }

    #[test]
    fn test_union_size_is_largest_member() {
        let layout = MemoryLayout::union_layout([
            MemoryLayout::from(ValueLayout::INT),
            MemoryLayout::from(ValueLayout::DOUBLE),
            MemoryLayout::from(ValueLayout::SHORT),
        ]);
        assert_eq!(layout.byte_size(), 8);
        let group = layout.as_group().unwrap();
        assert!(group.member_offsets().all(|(offset, _)| offset == 0));
    }

    #[test]
    fn test_sequence_size_overflow() {
        let err = MemoryLayout::sequence_layout(u64::MAX, ValueLayout::LONG.into()).unwrap_err();
        assert!(matches!(err, LayoutError::SizeOverflow(_)));
    }

    #[test]
    fn test_display_is_compact() {
        let le = |v: ValueLayout| v.with_order(ByteOrder::LittleEndian);
        let layout = MemoryLayout::struct_layout([
            MemoryLayout::from(le(ValueLayout::INT).with_name("x")),
            MemoryLayout::sequence_layout(2, le(ValueLayout::SHORT).into()).unwrap(),
        ])
        .unwrap()
        .with_name("s");
        assert_eq!(layout.to_string(), "[i4(x)[2:s2]](s)");
        assert_eq!(point().as_group().unwrap().members().len(), 2);
    }

    #[test]
    fn test_scalar_fields_flattens_nested_layouts() {
        let layout = MemoryLayout::struct_layout([
            point(),
            MemoryLayout::sequence_layout(2, ValueLayout::FLOAT.into()).unwrap(),
        ])
        .unwrap();
        let offsets: Vec<u64> = layout.scalar_fields().iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 4, 8, 12]);
    }

    #[test]
    fn test_alignment_must_be_power_of_two() {
        assert!(ValueLayout::INT.with_byte_alignment(3).is_err());
        assert!(ValueLayout::INT.with_byte_alignment(16).is_ok());
        assert!(point().with_byte_alignment(2).is_err());
    }
}
