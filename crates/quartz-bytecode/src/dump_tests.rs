use indexmap::IndexMap;

use quartz_core::{Colors, ScalarKind, TypeDef, TypeTable};

use super::assembler::Assembler;
use super::codec::{CodecError, encode};
use super::dump::{disassemble, disassemble_colored, dump_unit};
use super::opcodes::{Opcode, pack_cast};
use super::operand::Operand;
use super::source_map::{SourceMap, SourceNode};
use super::unit::{CompiledUnit, ConstantDecl, Routine, RoutineId};

#[test]
fn operands_and_annotations() {
    let mut asm = Assembler::new();
    asm.emit_with_node(
        Opcode::PushI64,
        &[Operand::I64(257)],
        SourceNode::new("257", 1, 9),
    )
    .unwrap();
    asm.emit(
        Opcode::Cast,
        &[Operand::U8(pack_cast(ScalarKind::I64, ScalarKind::U8))],
    )
    .unwrap();
    asm.emit_with_node(
        Opcode::FieldSet,
        &[Operand::U16(2), Operand::U16(0)],
        SourceNode::new("s.b = 257", 1, 1),
    )
    .unwrap();
    asm.emit(Opcode::Return, &[]).unwrap();
    let (code, map) = asm.finish().unwrap();

    insta::assert_snapshot!(disassemble(&code, &map).unwrap(), @r"
    0000 PUSH_I64 257  ; 257 @ 1:9
    0009 CAST 114 (i64->u8)
    0011 FIELD_SET 2 0  ; s.b = 257 @ 1:1
    0016 RETURN
    ");
}

#[test]
fn derived_fields() {
    let mut asm = Assembler::new();
    let top = asm.label();
    let end = asm.label();
    asm.bind(top);
    asm.emit(Opcode::PushBool, &[Operand::U8(1)]).unwrap();
    asm.emit_jump(Opcode::JumpIfFalse, end).unwrap();
    asm.emit(Opcode::PushF64, &[Operand::U64(2.5f64.to_bits())]).unwrap();
    asm.emit_jump(Opcode::Jump, top).unwrap();
    asm.bind(end);
    asm.emit(Opcode::ConstGet, &[Operand::U32(8)]).unwrap();
    let (code, map) = asm.finish().unwrap();

    insta::assert_snapshot!(disassemble(&code, &map).unwrap(), @r"
    0000 PUSH_BOOL 1 (true)
    0002 JUMP_IF_FALSE 21 (+14)
    0007 PUSH_F64 4612811918334230528 (2.5)
    0016 JUMP 0 (-21)
    0021 CONST_GET 8 (flag@8 data@9)
    ");
}

#[test]
fn one_line_per_instruction() {
    let program: &[(Opcode, &[Operand])] = &[
        (Opcode::LocalGet, &[Operand::U16(0)]),
        (Opcode::FieldGet, &[Operand::U16(1), Operand::U16(2)]),
        (Opcode::PushI64, &[Operand::I64(2)]),
        (Opcode::Mul, &[]),
        (Opcode::NativeRef, &[Operand::U16(0), Operand::U16(5)]),
        (Opcode::ProcContext, &[]),
        (Opcode::CallProc, &[Operand::U16(5)]),
        (Opcode::Return, &[]),
    ];
    let mut code = Vec::new();
    for (op, operands) in program {
        code.extend(encode(*op, operands).unwrap());
    }

    let text = disassemble(&code, &SourceMap::new()).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), program.len());
    for (line, (op, _)) in lines.iter().zip(program) {
        assert_eq!(line.split(' ').nth(1), Some(op.name()));
    }
}

#[test]
fn overrunning_stream_is_fatal() {
    let mut code = encode(Opcode::Nop, &[]).unwrap();
    code.extend(encode(Opcode::LocalGet, &[Operand::U16(300)]).unwrap());
    code.pop();

    assert_eq!(
        disassemble(&code, &SourceMap::new()).unwrap_err(),
        CodecError::Truncated {
            ip: 1,
            needed: 3,
            available: 2
        }
    );
}

#[test]
fn colored_output() {
    let code = encode(Opcode::LocalGet, &[Operand::U16(1)]).unwrap();
    let text = disassemble_colored(&code, &SourceMap::new(), Colors::ON).unwrap();
    assert_eq!(
        text,
        "\x1b[2m0000\x1b[0m \x1b[34mLOCAL_GET\x1b[0m \x1b[32m1\x1b[0m\n"
    );
}

#[test]
fn whole_unit_dump() {
    let mut types = TypeTable::new();
    let i64_ty = types.scalar(ScalarKind::I64);
    let fields: IndexMap<_, _> = [("x".to_string(), i64_ty), ("y".to_string(), i64_ty)]
        .into_iter()
        .collect();
    let point = types.add(TypeDef::Struct {
        name: "Point".to_string(),
        fields,
    });
    types.add(TypeDef::Proc {
        params: vec![i64_ty],
        ret: Some(i64_ty),
        closure: true,
    });

    let mut asm = Assembler::new();
    asm.emit(Opcode::PushI64, &[Operand::I64(42)]).unwrap();
    asm.emit(Opcode::Return, &[]).unwrap();
    let main_entry = asm.ip();
    asm.emit(Opcode::ConstGet, &[Operand::U32(0)]).unwrap();
    asm.emit(Opcode::Return, &[]).unwrap();
    let (code, source_map) = asm.finish().unwrap();

    let unit = CompiledUnit {
        code,
        source_map,
        types,
        routines: vec![
            Routine {
                name: "answer".to_string(),
                entry: 0,
                params: 0,
                locals: vec![],
                ret: Some(i64_ty),
            },
            Routine {
                name: "main".to_string(),
                entry: main_entry,
                params: 0,
                locals: vec![point],
                ret: None,
            },
        ],
        constants: vec![ConstantDecl {
            name: "ANSWER".to_string(),
            ty: i64_ty,
            initializer: RoutineId(0),
            offset: 0,
        }],
        natives: vec!["scale".to_string()],
        entry: Some(RoutineId(1)),
    };

    insta::assert_snapshot!(dump_unit(&unit, Colors::OFF).unwrap(), @r"
    [types]
    T0 = i64
    T1 = struct Point { x: i64, y: i64 }
    T2 = Proc(i64 -> i64) closure

    [routines]
    answer = 0000 :: () -> i64  locals=0
    main   = 0010 :: () -> void  locals=1

    [constants]
    ANSWER @0 :: i64 <- answer

    [natives]
    #0 scale

    [code]
    answer:
    0000 PUSH_I64 42
    0009 RETURN

    main:
    0010 CONST_GET 0 (flag@0 data@1)
    0015 RETURN
    ");
}
