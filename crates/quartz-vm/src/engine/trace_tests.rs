use quartz_bytecode::{CompiledUnit, Opcode, Operand, RoutineId};
use quartz_core::{Colors, ScalarKind, TypeTable};

use super::constants::ConstantPool;
use super::test_utils::UnitBuilder;
use super::trace::{PrintTracer, Tracer, Verbosity};
use super::value::Value;
use super::vm::VM;

/// `ANSWER = 42`, and `main` reads it twice.
fn unit() -> (CompiledUnit, RoutineId) {
    let mut types = TypeTable::new();
    let i64_ty = types.scalar(ScalarKind::I64);
    let mut b = UnitBuilder::new(types);
    let answer = b.routine("answer", 0, &[], Some(i64_ty), |r| {
        r.op(Opcode::PushI64, &[Operand::I64(42)])
            .op(Opcode::Return, &[]);
    });
    let offset = b.constant("ANSWER", i64_ty, 8, answer);
    let main = b.routine("main", 0, &[], Some(i64_ty), |r| {
        r.op(Opcode::ConstGet, &[Operand::U32(offset)])
            .op(Opcode::ConstGet, &[Operand::U32(offset)])
            .op_at(Opcode::Add, &[], "ANSWER + ANSWER")
            .op(Opcode::Return, &[]);
    });
    (b.finish(), main)
}

#[test]
fn trace_nests_calls_and_constant_init() {
    let (unit, main) = unit();
    let mut pool = ConstantPool::for_unit(&unit).unwrap();
    let mut vm = VM::builder(&unit, &mut pool).build().unwrap();
    let mut tracer = PrintTracer::new(&unit, Colors::OFF).verbosity(Verbosity::Verbose);

    let result = vm.execute_with(main, &[], &mut tracer).unwrap();

    assert_eq!(result, Value::Int(84));
    insta::assert_snapshot!(tracer.output(), @r"
    main:
      0010 CONST_GET 0 (flag@0 data@1)
      const ANSWER @0: init
      answer:
        0000 PUSH_I64 42
        0009 RETURN
        => 42
      const ANSWER @0: ready
      0015 CONST_GET 0 (flag@0 data@1)
      const ANSWER @0: cached
      0020 ADD  ; ANSWER + ANSWER @ 1:1
      0021 RETURN
      => 84
    ");
}

#[test]
fn second_run_only_hits_the_cache() {
    let (unit, main) = unit();
    let mut pool = ConstantPool::for_unit(&unit).unwrap();
    let mut vm = VM::builder(&unit, &mut pool).build().unwrap();
    vm.execute(main, &[]).unwrap();

    let mut tracer = PrintTracer::new(&unit, Colors::OFF).verbosity(Verbosity::Verbose);
    vm.execute_with(main, &[], &mut tracer).unwrap();

    let consts: Vec<_> = tracer
        .lines()
        .iter()
        .filter(|l| l.contains("const "))
        .map(|l| l.trim())
        .collect();
    assert_eq!(consts, ["const ANSWER @0: cached", "const ANSWER @0: cached"]);
}

#[test]
fn colored_trace_wraps_names() {
    let (unit, _) = unit();
    let mut tracer = PrintTracer::new(&unit, Colors::ON).verbosity(Verbosity::Verbose);

    tracer.trace_call(RoutineId(1));
    tracer.trace_alloc(1 << 32, 16);
    tracer.trace_return(&Value::Int(1));

    assert_eq!(
        tracer.lines(),
        [
            "\x1b[34mmain\x1b[0m:",
            "  alloc 16 bytes at 0x100000000",
            "  => \x1b[32m1\x1b[0m",
        ]
    );
}

#[test]
fn default_verbosity_hides_cache_hits() {
    let (unit, main) = unit();
    let mut pool = ConstantPool::for_unit(&unit).unwrap();
    let mut vm = VM::builder(&unit, &mut pool).build().unwrap();
    let mut tracer = PrintTracer::new(&unit, Colors::OFF);

    vm.execute_with(main, &[], &mut tracer).unwrap();
    tracer.trace_alloc(1 << 32, 8);

    let output = tracer.output();
    assert!(output.contains("const ANSWER @0: init"));
    assert!(!output.contains("cached"));
    assert!(!output.contains("alloc"));
}
