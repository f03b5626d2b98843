//! Downcalls into real native code and native code calling upcall stubs,
//! on hosts whose ABI the linker supports.

use foreign_linker::abi::{FunctionDescriptor, LinkerOptions, Platform};
use foreign_linker::layout::{MemoryLayout, ValueLayout};
use foreign_linker::linker::Linker;
use foreign_linker::memory::{Arena, Value};

fn host_linker() -> Option<Linker> {
    let linker = Linker::new(Platform::host()?).ok()?;
    linker.is_native().then_some(linker)
}

/// struct { int a; int b; double c; }
fn mixed() -> MemoryLayout {
    MemoryLayout::struct_layout([
        MemoryLayout::from(ValueLayout::INT),
        MemoryLayout::from(ValueLayout::INT),
        MemoryLayout::from(ValueLayout::DOUBLE),
    ])
    .unwrap()
}

#[test]
fn native_stub_round_trips_structs_and_scalars() -> anyhow::Result<()> {
    let Some(linker) = host_linker() else {
        return Ok(());
    };
    let desc = FunctionDescriptor::of(
        mixed(),
        [mixed(), ValueLayout::SHORT.into(), ValueLayout::FLOAT.into()],
    );
    let arena = Arena::new();
    let stub = linker.upcall_stub(
        |args, arena| {
            let [Value::Address(s), Value::Short(k), Value::Float(f)] = args else {
                return None;
            };
            let input = arena.memory().segment(*s, 16, arena.scope().clone()).ok()?;
            let a = input.get(&ValueLayout::INT, 0).ok()?.as_i64()?;
            let c = input.get(&ValueLayout::DOUBLE, 8).ok()?.as_f64()?;
            let out = arena.allocate_layout(&mixed()).ok()?;
            out.set(&ValueLayout::INT, 0, Value::Int((a + i64::from(*k)) as i32)).ok()?;
            out.set(&ValueLayout::INT, 4, Value::Int(-1)).ok()?;
            out.set(&ValueLayout::DOUBLE, 8, Value::Double(c * f64::from(*f))).ok()?;
            Some(Value::Address(out.address()))
        },
        &desc,
        &arena,
    )?;
    assert_ne!(stub.address(), 0);

    let input = arena.allocate_layout(&mixed())?;
    input.set(&ValueLayout::INT, 0, Value::Int(40))?;
    input.set(&ValueLayout::DOUBLE, 8, Value::Double(1.25))?;
    let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
    let result = handle.invoke(
        stub.address(),
        &arena,
        &[Value::Address(input.address()), Value::Short(-2), Value::Float(4.0)],
    )?;
    let Some(Value::Address(address)) = result else {
        panic!("expected a struct address, got {:?}", result);
    };
    let output = arena.memory().segment(address, 16, arena.scope().clone())?;
    assert_eq!(output.get(&ValueLayout::INT, 0)?, Value::Int(38));
    assert_eq!(output.get(&ValueLayout::INT, 4)?, Value::Int(-1));
    assert_eq!(output.get(&ValueLayout::DOUBLE, 8)?, Value::Double(5.0));
    Ok(())
}

#[test]
fn native_stub_returns_large_structs() -> anyhow::Result<()> {
    let Some(linker) = host_linker() else {
        return Ok(());
    };
    let large = MemoryLayout::struct_layout(vec![MemoryLayout::from(ValueLayout::LONG); 4])?;
    let desc = FunctionDescriptor::of(large.clone(), [ValueLayout::LONG.into()]);
    let arena = Arena::new();
    let stub = linker.upcall_stub(
        move |args, arena| {
            let [Value::Long(seed)] = args else {
                return None;
            };
            let out = arena.allocate_layout(&large).ok()?;
            for i in 0..4u64 {
                out.set(&ValueLayout::LONG, i * 8, Value::Long(seed * i as i64)).ok()?;
            }
            Some(Value::Address(out.address()))
        },
        &desc,
        &arena,
    )?;
    let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
    let Some(Value::Address(address)) = handle.invoke(stub.address(), &arena, &[Value::Long(-3)])? else {
        panic!("expected a struct address");
    };
    let output = arena.memory().segment(address, 32, arena.scope().clone())?;
    for i in 0..4u64 {
        assert_eq!(output.get(&ValueLayout::LONG, i * 8)?, Value::Long(-3 * i as i64));
    }
    Ok(())
}

#[test]
fn native_stubs_are_released_with_their_arena() -> anyhow::Result<()> {
    let Some(linker) = host_linker() else {
        return Ok(());
    };
    let desc: FunctionDescriptor = "(i4)i4".parse()?;
    for _ in 0..3 {
        let arena = Arena::new();
        let stubs: Vec<_> = (0..8)
            .map(|n| linker.upcall_stub(move |_, _| Some(Value::Int(n)), &desc, &arena))
            .collect::<Result<_, _>>()?;
        let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
        assert_eq!(handle.invoke(stubs[5].address(), &arena, &[Value::Int(0)])?, Some(Value::Int(5)));
        assert_eq!(linker.upcall_stub_count(), 8);
        arena.close();
        assert_eq!(linker.upcall_stub_count(), 0);
    }
    Ok(())
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod libc {
    use foreign_linker::lookup::{LibraryLookup, SymbolLookup};

    use super::*;

    #[test]
    fn strlen_counts_bytes() -> anyhow::Result<()> {
        let Some(linker) = host_linker() else {
            return Ok(());
        };
        let libc = LibraryLookup::open("libc.so.6")?;
        let strlen = libc.find_or_err("strlen")?;
        let handle = linker.downcall_handle(&"(a8)j8".parse()?, &LinkerOptions::default())?;
        let arena = Arena::new();
        let text = arena.allocate_bytes(b"hello\0", 1)?;
        assert_eq!(
            handle.invoke(strlen, &arena, &[Value::Address(text.address())])?,
            Some(Value::Long(5))
        );
        let empty = arena.allocate_bytes(b"\0", 1)?;
        assert_eq!(
            handle.invoke(strlen, &arena, &[Value::Address(empty.address())])?,
            Some(Value::Long(0))
        );
        Ok(())
    }

    #[test]
    fn qsort_calls_back_into_a_comparator() -> anyhow::Result<()> {
        let Some(linker) = host_linker() else {
            return Ok(());
        };
        let libc = LibraryLookup::open("libc.so.6")?;
        let qsort = libc.find_or_err("qsort")?;
        let arena = Arena::new();

        let compare = linker.upcall_stub(
            |args, arena| {
                let [Value::Address(a), Value::Address(b)] = args else {
                    return None;
                };
                let read = |address: u64| {
                    let bytes = arena.memory().read(address, 4).ok()?;
                    Some(i32::from_ne_bytes(bytes.try_into().ok()?))
                };
                Some(Value::Int(read(*a)?.cmp(&read(*b)?) as i32))
            },
            &"(a8a8)i4".parse()?,
            &arena,
        )?;

        let input = [9, -4, 17, 0, 3, 3, -20, 8];
        let array = arena.allocate(4 * input.len() as u64, 4)?;
        for (i, value) in input.iter().enumerate() {
            array.write_bytes(4 * i as u64, &i32::to_ne_bytes(*value))?;
        }
        let handle = linker.downcall_handle(&"(a8j8j8a8)v".parse()?, &LinkerOptions::default())?;
        let result = handle.invoke(
            qsort,
            &arena,
            &[
                Value::Address(array.address()),
                Value::Long(input.len() as i64),
                Value::Long(4),
                Value::Address(compare.address()),
            ],
        )?;
        assert_eq!(result, None);

        let sorted: Vec<i32> = array
            .to_bytes()?
            .chunks_exact(4)
            .map(|chunk| i32::from_ne_bytes(chunk.try_into().unwrap()))
            .collect();
        let mut expected = input.to_vec();
        expected.sort_unstable();
        assert_eq!(sorted, expected);
        Ok(())
    }
}
