//! Layout paths, offsets and accessor handles through the public API.

use foreign_linker::layout::{LayoutError, MemoryLayout, PathElement, ValueLayout};
use foreign_linker::memory::{Arena, Value};
use proptest::prelude::*;

fn point() -> MemoryLayout {
    MemoryLayout::struct_layout([
        MemoryLayout::from(ValueLayout::INT.with_name("x")),
        MemoryLayout::from(ValueLayout::INT.with_name("y")),
    ])
    .unwrap()
    .with_name("point")
}

fn polygon(points: u64) -> MemoryLayout {
    MemoryLayout::struct_layout([
        MemoryLayout::from(ValueLayout::LONG.with_name("count")),
        MemoryLayout::sequence_layout(points, point())
            .unwrap()
            .with_name("points"),
    ])
    .unwrap()
}

#[test]
fn nested_offsets() -> anyhow::Result<()> {
    let layout = polygon(4);
    let offset = layout.byte_offset(&[
        PathElement::group_name("points"),
        PathElement::sequence_index(2)?,
        PathElement::group_name("y"),
    ])?;
    assert_eq!(offset, 8 + 2 * 8 + 4);
    Ok(())
}

#[test]
fn accessor_reads_and_writes_open_elements() -> anyhow::Result<()> {
    let layout = polygon(3);
    let arena = Arena::new();
    let segment = arena.allocate_layout(&layout)?;
    let y = layout.var_handle(&[
        PathElement::group_name("points"),
        PathElement::sequence_element(),
        PathElement::group_name("y"),
    ])?;
    assert_eq!(y.coordinate_count(), 1);
    for i in 0..3 {
        y.set(&segment, 0, &[i], Value::Int(i as i32 * 10))?;
    }
    assert_eq!(segment.get(&ValueLayout::INT, 8 + 2 * 8 + 4)?, Value::Int(20));
    assert_eq!(y.get(&segment, 0, &[1])?, Value::Int(10));
    assert!(matches!(
        y.get(&segment, 0, &[3]),
        Err(LayoutError::IndexOutOfBounds { index: 3, bound: 3 })
    ));
    Ok(())
}

#[test]
fn bad_path_lists_breadcrumbs() {
    let err = polygon(2)
        .select(&[PathElement::group_name("points"), PathElement::group_name("x")])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Bad layout path: "), "{}", message);
    assert!(message.contains("selected from: "), "{}", message);
}

#[test]
fn dereference_follows_pointer() -> anyhow::Result<()> {
    let arena = Arena::new();
    let target = arena.allocate_layout(&point())?;
    target.set(&ValueLayout::INT, 4, Value::Int(99))?;

    let holder = MemoryLayout::struct_layout([MemoryLayout::from(
        ValueLayout::ADDRESS
            .with_target_layout(point())?
            .with_name("p"),
    )])?;
    let segment = arena.allocate_layout(&holder)?;
    segment.set(&ValueLayout::ADDRESS, 0, Value::Address(target.address()))?;

    let y = holder.var_handle(&[
        PathElement::group_name("p"),
        PathElement::dereference(),
        PathElement::group_name("y"),
    ])?;
    assert_eq!(y.get(&segment, 0, &[])?, Value::Int(99));
    Ok(())
}

#[test]
fn slice_handle_selects_sub_struct() -> anyhow::Result<()> {
    let layout = polygon(2);
    let arena = Arena::new();
    let segment = arena.allocate_layout(&layout)?;
    let points = layout.slice_handle(&[PathElement::group_name("points"), PathElement::sequence_element()])?;
    let second = points.slice(&segment, 0, &[1])?;
    assert_eq!(second.address(), segment.address() + 16);
    assert_eq!(second.byte_size(), 8);
    Ok(())
}

#[test]
fn descriptors_round_trip_through_display() -> anyhow::Result<()> {
    let layout = polygon(2);
    let parsed: MemoryLayout = layout.to_string().parse()?;
    assert_eq!(parsed, layout);
    Ok(())
}

fn carrier_layout() -> impl Strategy<Value = ValueLayout> {
    prop_oneof![
        Just(ValueLayout::BYTE),
        Just(ValueLayout::SHORT),
        Just(ValueLayout::INT),
        Just(ValueLayout::LONG),
        Just(ValueLayout::FLOAT),
        Just(ValueLayout::DOUBLE),
        Just(ValueLayout::ADDRESS),
    ]
}

proptest! {
    #[test]
    fn struct_member_offsets(members in prop::collection::vec(carrier_layout(), 1..10)) {
        // Insert the padding a C compiler would, then check every named member.
        let mut layouts = Vec::new();
        let mut expected = Vec::new();
        let mut offset = 0u64;
        for (i, member) in members.iter().enumerate() {
            let align = member.byte_alignment();
            let padded = offset.div_ceil(align) * align;
            if padded > offset {
                layouts.push(MemoryLayout::padding_layout(padded - offset).unwrap());
            }
            expected.push(padded);
            layouts.push(MemoryLayout::from(member.clone().with_name(format!("m{}", i))));
            offset = padded + member.byte_size();
        }
        let layout = MemoryLayout::struct_layout(layouts).unwrap();
        prop_assert_eq!(layout.byte_size(), offset);
        for (i, want) in expected.iter().enumerate() {
            let got = layout.byte_offset(&[PathElement::group_name(format!("m{}", i))]).unwrap();
            prop_assert_eq!(got, *want);
        }
    }

    #[test]
    fn sequence_range_counts(count in 1u64..64, start in 0i64..64, step in prop_oneof![-5i64..0, 1i64..6]) {
        let layout = MemoryLayout::sequence_layout(count, ValueLayout::INT.into()).unwrap();
        let range = layout.select(&[PathElement::sequence_range(start, step).unwrap()]);
        if start >= count as i64 {
            prop_assert!(range.is_err());
        } else {
            let expected = if step > 0 {
                (count as i64 - start + step - 1) / step
            } else {
                (start + 1 + (-step) - 1) / -step
            };
            let handle = range.unwrap().offset_handle();
            prop_assert_eq!(handle.bounds(), &[expected][..]);
            prop_assert_eq!(handle.strides(), &[step * 4][..]);
        }
    }
}
