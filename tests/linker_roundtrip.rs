//! Downcalls into upcall stubs: every argument and result crosses a real
//! register and stack image for the ABI under test.

use std::sync::Arc;

use foreign_linker::abi::{
    Arch, CallingSequence, FunctionDescriptor, LinkerOptions, Os, Platform, ReturnBinding, Storage,
};
use foreign_linker::layout::{MemoryLayout, ValueLayout};
use foreign_linker::linker::{CallFrame, Linker, LinkerError, NativeInvoker};
use foreign_linker::memory::{Arena, Value};
use parking_lot::Mutex;

const PLATFORMS: [(Arch, Os); 6] = [
    (Arch::X64, Os::Linux),
    (Arch::X64, Os::Windows),
    (Arch::AArch64, Os::Linux),
    (Arch::Ppc64le, Os::Linux),
    (Arch::Ppc64, Os::Aix),
    (Arch::S390x, Os::Linux),
];

fn linker(arch: Arch, os: Os) -> Linker {
    Linker::loopback(Platform::new(arch, os)).unwrap()
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

/// struct { long x; long y; long z; }
fn large() -> MemoryLayout {
    MemoryLayout::struct_layout(vec![MemoryLayout::from(ValueLayout::LONG); 3]).unwrap()
}

#[test]
fn struct_arguments_and_results() -> anyhow::Result<()> {
    // S f(S s, int k, double d) { return (S){ s.a + k, s.b * 2, s.c + d }; }
    let desc = FunctionDescriptor::of(
        mixed(),
        [mixed(), ValueLayout::INT.into(), ValueLayout::DOUBLE.into()],
    );
    for (arch, os) in PLATFORMS {
        let linker = linker(arch, os);
        let arena = Arena::new();
        let stub = linker.upcall_stub(
            |args, arena| {
                let [Value::Address(s), Value::Int(k), Value::Double(d)] = args else {
                    return None;
                };
                let input = arena.memory().segment(*s, 16, arena.scope().clone()).ok()?;
                let a = input.get(&ValueLayout::INT, 0).ok()?.as_i64()?;
                let b = input.get(&ValueLayout::INT, 4).ok()?.as_i64()?;
                let c = input.get(&ValueLayout::DOUBLE, 8).ok()?.as_f64()?;
                let out = arena.allocate_layout(&mixed()).ok()?;
                out.set(&ValueLayout::INT, 0, Value::Int((a + i64::from(*k)) as i32)).ok()?;
                out.set(&ValueLayout::INT, 4, Value::Int((b * 2) as i32)).ok()?;
                out.set(&ValueLayout::DOUBLE, 8, Value::Double(c + d)).ok()?;
                Some(Value::Address(out.address()))
            },
            &desc,
            &arena,
        )?;

        let input = arena.allocate_layout(&mixed())?;
        input.set(&ValueLayout::INT, 0, Value::Int(1))?;
        input.set(&ValueLayout::INT, 4, Value::Int(-7))?;
        input.set(&ValueLayout::DOUBLE, 8, Value::Double(0.5))?;

        let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
        let result = handle.invoke(
            stub.address(),
            &arena,
            &[Value::Address(input.address()), Value::Int(41), Value::Double(2.25)],
        )?;
        let Some(Value::Address(address)) = result else {
            panic!("{}-{}: expected a struct address, got {:?}", arch, os, result);
        };
        let output = arena.memory().segment(address, 16, arena.scope().clone())?;
        assert_eq!(output.get(&ValueLayout::INT, 0)?, Value::Int(42), "{}-{}", arch, os);
        assert_eq!(output.get(&ValueLayout::INT, 4)?, Value::Int(-14), "{}-{}", arch, os);
        assert_eq!(output.get(&ValueLayout::DOUBLE, 8)?, Value::Double(2.75), "{}-{}", arch, os);
        // The caller's struct was passed by value or as a copy, never mutated.
        assert_eq!(input.get(&ValueLayout::INT, 0)?, Value::Int(1));
    }
    Ok(())
}

#[test]
fn large_results_come_back_through_memory() -> anyhow::Result<()> {
    let desc = FunctionDescriptor::of(large(), [ValueLayout::LONG.into()]);
    for (arch, os) in PLATFORMS {
        let linker = linker(arch, os);
        let arena = Arena::new();
        let stub = linker.upcall_stub(
            |args, arena| {
                let [Value::Long(seed)] = args else {
                    return None;
                };
                let out = arena.allocate_layout(&large()).ok()?;
                for i in 0..3 {
                    out.set(&ValueLayout::LONG, i * 8, Value::Long(seed + i as i64)).ok()?;
                }
                Some(Value::Address(out.address()))
            },
            &desc,
            &arena,
        )?;
        let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
        assert!(handle.calling_sequence().needs_return_buffer(), "{}-{}", arch, os);

        let result = handle.invoke(stub.address(), &arena, &[Value::Long(100)])?;
        let Some(Value::Address(address)) = result else {
            panic!("{}-{}: expected a buffer address", arch, os);
        };
        let output = arena.memory().segment(address, 24, arena.scope().clone())?;
        for i in 0..3u64 {
            assert_eq!(output.get(&ValueLayout::LONG, i * 8)?, Value::Long(100 + i as i64));
        }
    }
    Ok(())
}

#[test]
fn floats_survive_register_widening() -> anyhow::Result<()> {
    let desc = FunctionDescriptor::of(
        ValueLayout::FLOAT.into(),
        [ValueLayout::FLOAT.into(), ValueLayout::FLOAT.into()],
    );
    for (arch, os) in PLATFORMS {
        let linker = linker(arch, os);
        let arena = Arena::new();
        let stub = linker.upcall_stub(
            |args, _| match args {
                [Value::Float(x), Value::Float(y)] => Some(Value::Float(x * y)),
                _ => None,
            },
            &desc,
            &arena,
        )?;
        let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
        let result = handle.invoke(stub.address(), &arena, &[Value::Float(1.5), Value::Float(-4.0)])?;
        assert_eq!(result, Some(Value::Float(-6.0)), "{}-{}", arch, os);
    }
    Ok(())
}

#[test]
fn upcall_without_result_is_an_error() -> anyhow::Result<()> {
    let linker = linker(Arch::X64, Os::Linux);
    let desc = FunctionDescriptor::of(ValueLayout::INT.into(), []);
    let arena = Arena::new();
    let stub = linker.upcall_stub(|_, _| None, &desc, &arena)?;
    let handle = linker.downcall_handle(&desc, &LinkerOptions::default())?;
    assert!(matches!(
        handle.invoke(stub.address(), &arena, &[]),
        Err(LinkerError::MissingReturnValue(_))
    ));
    Ok(())
}

/// Records the frame it is called with and answers with a fixed value.
struct Recorder {
    answer: Storage,
    seen: Mutex<Option<CallFrame>>,
}

impl NativeInvoker for Recorder {
    fn invoke(
        &self,
        _target: u64,
        _sequence: &CallingSequence,
        frame: &mut CallFrame,
        _arena: &Arena,
    ) -> Result<(), LinkerError> {
        *self.seen.lock() = Some(frame.clone());
        frame.write(self.answer, 3)
    }
}

#[test]
fn variadic_call_reports_vector_registers() -> anyhow::Result<()> {
    // printf("%f %f", 1.0, 2.0)
    let desc = FunctionDescriptor::of(
        ValueLayout::INT.into(),
        [ValueLayout::ADDRESS.into(), ValueLayout::DOUBLE.into(), ValueLayout::DOUBLE.into()],
    );
    let base = linker(Arch::X64, Os::Linux);
    let sequence = base.calling_sequence(&desc, &LinkerOptions::first_variadic_arg(1))?;
    let ReturnBinding::Value { storage: answer, .. } = *sequence.return_binding() else {
        panic!("expected a scalar return");
    };
    let recorder = Arc::new(Recorder {
        answer,
        seen: Mutex::new(None),
    });
    let linker = base.with_invoker(recorder.clone());
    let handle = linker.downcall_handle(&desc, &LinkerOptions::first_variadic_arg(1))?;
    let arena = Arena::new();
    let result = handle.invoke(
        0x1000,
        &arena,
        &[Value::Address(0x2000), Value::Double(1.0), Value::Double(2.0)],
    )?;
    assert_eq!(result, Some(Value::Int(3)));

    let frame = recorder.seen.lock().clone().unwrap();
    assert_eq!(frame.vector_count, Some(2));
    assert_eq!(frame.gprs[0], 0x2000);
    assert_eq!(f64::from_bits(frame.fprs[0]), 1.0);
    assert_eq!(f64::from_bits(frame.fprs[1]), 2.0);
    Ok(())
}
