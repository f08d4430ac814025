use std::io::Write;

use quartz_bytecode::{Assembler, CompiledUnit, Opcode, Operand, Routine, RoutineId};
use quartz_core::{ScalarKind, TypeTable};
use quartz_vm::Value;

use super::unit_loader::{LoadError, load_unit, parse_arg, resolve_routine};

fn unit() -> CompiledUnit {
    let mut types = TypeTable::new();
    let i64_ty = types.scalar(ScalarKind::I64);
    let mut asm = Assembler::new();
    asm.emit(Opcode::PushI64, &[Operand::I64(7)]).unwrap();
    asm.emit(Opcode::Return, &[]).unwrap();
    let (code, source_map) = asm.finish().unwrap();
    CompiledUnit {
        code,
        source_map,
        types,
        routines: vec![Routine {
            name: "seven".to_string(),
            entry: 0,
            params: 0,
            locals: vec![],
            ret: Some(i64_ty),
        }],
        entry: Some(RoutineId(0)),
        ..CompiledUnit::default()
    }
}

#[test]
fn loads_binary_and_json() {
    let unit = unit();

    let mut binary = tempfile::NamedTempFile::new().unwrap();
    binary.write_all(&unit.to_bytes().unwrap()).unwrap();
    binary.flush().unwrap();

    let mut json = tempfile::NamedTempFile::new().unwrap();
    json.write_all(unit.to_json().unwrap().as_bytes()).unwrap();
    json.flush().unwrap();

    assert_eq!(load_unit(binary.path()).unwrap(), unit);
    assert_eq!(load_unit(json.path()).unwrap(), unit);
}

#[test]
fn load_errors_name_the_file() {
    let mut garbage = tempfile::NamedTempFile::new().unwrap();
    garbage.write_all(b"not a unit").unwrap();
    garbage.flush().unwrap();

    let err = load_unit(garbage.path()).unwrap_err();
    assert!(matches!(err, LoadError::Unit { .. }));
    assert!(err.to_string().starts_with(&garbage.path().display().to_string()));
}

#[test]
fn routine_resolution() {
    let mut unit = unit();

    assert_eq!(resolve_routine(&unit, Some("seven")).unwrap(), RoutineId(0));
    assert_eq!(resolve_routine(&unit, None).unwrap(), RoutineId(0));
    assert!(matches!(
        resolve_routine(&unit, Some("eight")),
        Err(LoadError::UnknownRoutine(name)) if name == "eight"
    ));

    unit.entry = None;
    assert!(matches!(resolve_routine(&unit, None), Err(LoadError::NoEntry)));
}

#[test]
fn argument_parsing() {
    assert_eq!(parse_arg("42").unwrap(), Value::Int(42));
    assert_eq!(parse_arg("-3").unwrap(), Value::Int(-3));
    assert_eq!(parse_arg("18446744073709551615").unwrap(), Value::UInt(u64::MAX));
    assert_eq!(parse_arg("2.5").unwrap(), Value::Float(2.5));
    assert_eq!(parse_arg("true").unwrap(), Value::Bool(true));
    assert_eq!(parse_arg("false").unwrap(), Value::Bool(false));
    assert!(matches!(parse_arg("forty"), Err(LoadError::InvalidArg(text)) if text == "forty"));
}
