use std::io::Write;

use quartz_bytecode::{Assembler, CompiledUnit, Opcode, Operand, Routine, RoutineId};
use quartz_core::{ScalarKind, TypeDef, TypeTable};
use quartz_vm::{FuelLimits, VM, Value};

use super::run_common::{RunInput, builtin_natives, try_prepare};
use super::unit_loader::LoadError;

/// `double(n: i32) -> i32`, which also prints `n` through the `print` native.
fn unit() -> CompiledUnit {
    let mut types = TypeTable::new();
    let i32_ty = types.scalar(ScalarKind::I32);
    let print_ty = types.add(TypeDef::Proc {
        params: vec![i32_ty],
        ret: None,
        closure: false,
    });

    let mut asm = Assembler::new();
    asm.emit(Opcode::NativeRef, &[Operand::U16(0), Operand::U16(print_ty.0)])
        .unwrap();
    asm.emit(Opcode::LocalGet, &[Operand::U16(0)]).unwrap();
    asm.emit(Opcode::CallProc, &[Operand::U16(print_ty.0)]).unwrap();
    asm.emit(Opcode::LocalGet, &[Operand::U16(0)]).unwrap();
    asm.emit(Opcode::PushI64, &[Operand::I64(2)]).unwrap();
    asm.emit(Opcode::Mul, &[]).unwrap();
    asm.emit(Opcode::Return, &[]).unwrap();
    let (code, source_map) = asm.finish().unwrap();

    CompiledUnit {
        code,
        source_map,
        types,
        routines: vec![Routine {
            name: "double".to_string(),
            entry: 0,
            params: 1,
            locals: vec![i32_ty],
            ret: Some(i32_ty),
        }],
        natives: vec!["print".to_string()],
        entry: Some(RoutineId(0)),
        ..CompiledUnit::default()
    }
}

fn unit_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&unit().to_bytes().unwrap()).unwrap();
    file.flush().unwrap();
    file
}

fn input(file: &tempfile::NamedTempFile, args: &[&str]) -> RunInput {
    RunInput {
        unit_path: file.path().to_path_buf(),
        routine: None,
        args: args.iter().map(|a| a.to_string()).collect(),
        limits: FuelLimits::new(),
    }
}

#[test]
fn prepared_run_executes_with_builtin_natives() {
    let file = unit_file();
    let mut prepared = try_prepare(&input(&file, &["21"])).unwrap();
    assert_eq!(prepared.routine, RoutineId(0));
    assert_eq!(prepared.args, [Value::Int(21)]);

    let natives = builtin_natives();
    let mut vm = VM::builder(&prepared.unit, &mut prepared.pool)
        .natives(&natives)
        .build()
        .unwrap();

    assert_eq!(vm.execute(prepared.routine, &prepared.args), Ok(Value::Int(42)));
}

#[test]
fn bad_argument_fails_preparation() {
    let file = unit_file();
    let err = try_prepare(&input(&file, &["x"])).err().unwrap();

    assert!(matches!(err, LoadError::InvalidArg(text) if text == "x"));
}

#[test]
fn builtin_natives_are_named() {
    let natives = builtin_natives();
    assert_eq!(natives.names().collect::<Vec<_>>(), ["print"]);
}
