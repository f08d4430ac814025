use super::codec::{CodecError, Decoder, decode_one, encode, encode_into};
use super::opcodes::Opcode;
use super::operand::{Operand, OperandType};

/// One operand value per declared slot, distinct per slot.
fn sample_operands(op: Opcode) -> Vec<Operand> {
    op.def()
        .operands
        .iter()
        .enumerate()
        .map(|(i, slot)| match slot.ty {
            OperandType::U8 => Operand::U8(0x80 + i as u8),
            OperandType::U16 => Operand::U16(0x1234 + i as u16),
            OperandType::U32 => Operand::U32(0xDEAD_0000 + i as u32),
            OperandType::I64 => Operand::I64(-123_456_789_012 - i as i64),
            OperandType::U64 => Operand::U64(u64::MAX - i as u64),
        })
        .collect()
}

#[test]
fn encode_layout() {
    let bytes = encode(Opcode::PushI64, &[Operand::I64(-2)]).unwrap();
    assert_eq!(bytes[0], Opcode::PushI64 as u8);
    assert_eq!(&bytes[1..], &[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

    let bytes = encode(Opcode::FieldGet, &[Operand::U16(3), Operand::U16(0x0102)]).unwrap();
    assert_eq!(bytes, vec![Opcode::FieldGet as u8, 3, 0, 0x02, 0x01]);
}

#[test]
fn encode_rejects_wrong_count() {
    let err = encode(Opcode::Add, &[Operand::U8(1)]).unwrap_err();
    assert_eq!(
        err,
        CodecError::OperandCount {
            opcode: "ADD",
            expected: 0,
            got: 1
        }
    );
    assert_eq!(err.to_string(), "ADD expects 0 operands, got 1");
}

#[test]
fn encode_rejects_wrong_type() {
    let mut out = vec![0xAA];
    let err = encode_into(&mut out, Opcode::PushI64, &[Operand::U64(1)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "PUSH_I64 operand `value` expects i64, got u64"
    );
    assert_eq!(out, vec![0xAA], "nothing written on failure");
}

#[test]
fn round_trip_every_opcode() {
    let mut code = Vec::new();
    let mut expected = Vec::new();
    for op in Opcode::ALL {
        let operands = sample_operands(*op);
        let ip = code.len() as u32;
        encode_into(&mut code, *op, &operands).unwrap();
        expected.push((ip, *op, operands));
    }

    let decoded: Vec<_> = Decoder::new(&code).map(Result::unwrap).collect();
    assert_eq!(decoded.len(), expected.len());
    for (instr, (ip, op, operands)) in decoded.iter().zip(&expected) {
        assert_eq!(instr.ip, *ip);
        assert_eq!(instr.opcode, *op);
        assert_eq!(instr.operands(), operands.as_slice());
        assert_eq!((instr.next_ip - instr.ip) as usize, op.def().encoded_len());
    }
    assert_eq!(decoded.last().unwrap().next_ip as usize, code.len());
}

#[test]
fn decode_at_jump_target() {
    let mut code = Vec::new();
    encode_into(&mut code, Opcode::PushI64, &[Operand::I64(7)]).unwrap();
    encode_into(&mut code, Opcode::LocalSet, &[Operand::U16(2)]).unwrap();
    encode_into(&mut code, Opcode::Return, &[]).unwrap();

    let instr = decode_one(&code, 9).unwrap();
    assert_eq!(instr.opcode, Opcode::LocalSet);
    assert_eq!(instr.u16(0), 2);
    assert_eq!(instr.next_ip, 12);

    let last = decode_one(&code, instr.next_ip).unwrap();
    assert_eq!(last.opcode, Opcode::Return);
    assert!(last.operands().is_empty());
}

#[test]
fn typed_accessors() {
    let code = encode(Opcode::Malloc, &[Operand::U16(4), Operand::U32(16)]).unwrap();
    let instr = decode_one(&code, 0).unwrap();
    assert_eq!(instr.u16(0), 4);
    assert_eq!(instr.u32(1), 16);
}

#[test]
#[should_panic(expected = "MALLOC operand 0 is u16")]
fn typed_accessor_width_mismatch_panics() {
    let code = encode(Opcode::Malloc, &[Operand::U16(4), Operand::U32(16)]).unwrap();
    decode_one(&code, 0).unwrap().u32(0);
}

#[test]
fn decode_truncated_operand() {
    let mut code = encode(Opcode::PushI64, &[Operand::I64(1)]).unwrap();
    code.truncate(5);
    assert_eq!(
        decode_one(&code, 0).unwrap_err(),
        CodecError::Truncated {
            ip: 0,
            needed: 9,
            available: 5
        }
    );
}

#[test]
fn decode_past_end() {
    let code = encode(Opcode::Nop, &[]).unwrap();
    assert_eq!(
        decode_one(&code, 1).unwrap_err(),
        CodecError::Truncated {
            ip: 1,
            needed: 1,
            available: 0
        }
    );
}

#[test]
fn decode_unknown_opcode() {
    let err = decode_one(&[0xFF], 0).unwrap_err();
    assert_eq!(err, CodecError::UnknownOpcode { ip: 0, byte: 0xFF });
    assert_eq!(err.to_string(), "unknown opcode 0xff at 0000");
}

#[test]
fn decoder_stops_after_error() {
    let mut code = encode(Opcode::Nop, &[]).unwrap();
    code.push(0xFF);
    code.push(Opcode::Nop as u8);

    let items: Vec<_> = Decoder::new(&code).collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].is_err());
}
