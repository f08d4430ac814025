//! Table-driven instruction codec.
//!
//! Layout of one instruction: a one-byte opcode tag, then each operand of
//! the opcode's table entry in order, little-endian, fixed width. There is
//! no per-opcode encode or decode code here; adding an opcode to the table
//! is all the codec needs.

use super::opcodes::{Opcode, OpcodeDef};
use super::operand::{Operand, OperandType};

/// Upper bound on operands per opcode (checked by the table tests).
pub const MAX_OPERANDS: usize = 2;

/// Codec errors. All of these are fatal for the enclosing operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("{opcode} expects {expected} operands, got {got}")]
    OperandCount {
        opcode: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{opcode} operand `{operand}` expects {expected}, got {got}")]
    OperandType {
        opcode: &'static str,
        operand: &'static str,
        expected: OperandType,
        got: OperandType,
    },
    #[error("unknown opcode 0x{byte:02x} at {ip:04}")]
    UnknownOpcode { ip: u32, byte: u8 },
    #[error("instruction at {ip:04} needs {needed} bytes, stream has {available}")]
    Truncated {
        ip: u32,
        needed: usize,
        available: usize,
    },
    #[error("label L{0} was never bound")]
    UnboundLabel(u32),
}

/// Encode one instruction into a fresh buffer.
pub fn encode(opcode: Opcode, operands: &[Operand]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(opcode.def().encoded_len());
    encode_into(&mut out, opcode, operands)?;
    Ok(out)
}

/// Append one encoded instruction to `out`.
///
/// Nothing is written if the operands do not match the table entry.
pub fn encode_into(
    out: &mut Vec<u8>,
    opcode: Opcode,
    operands: &[Operand],
) -> Result<(), CodecError> {
    let def = opcode.def();
    check_shape(def, operands)?;

    out.push(opcode as u8);
    for operand in operands {
        operand.write_to(out);
    }
    Ok(())
}

fn check_shape(def: &OpcodeDef, operands: &[Operand]) -> Result<(), CodecError> {
    if operands.len() != def.operands.len() {
        return Err(CodecError::OperandCount {
            opcode: def.name,
            expected: def.operands.len(),
            got: operands.len(),
        });
    }
    for (slot, value) in def.operands.iter().zip(operands) {
        if slot.ty != value.ty() {
            return Err(CodecError::OperandType {
                opcode: def.name,
                operand: slot.name,
                expected: slot.ty,
                got: value.ty(),
            });
        }
    }
    Ok(())
}

/// A decoded instruction. Operands are stored inline; decoding never
/// allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Offset of the opcode tag.
    pub ip: u32,
    /// Offset of the following instruction.
    pub next_ip: u32,
    operands: [Operand; MAX_OPERANDS],
    len: u8,
}

impl Instruction {
    #[inline]
    pub fn def(&self) -> &'static OpcodeDef {
        self.opcode.def()
    }

    #[inline]
    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.len as usize]
    }

    /// Operand `i`, which the table declares as `u8`.
    pub fn u8(&self, i: usize) -> u8 {
        match self.operands()[i] {
            Operand::U8(v) => v,
            other => self.shape_violation(i, other),
        }
    }

    /// Operand `i`, which the table declares as `u16`.
    pub fn u16(&self, i: usize) -> u16 {
        match self.operands()[i] {
            Operand::U16(v) => v,
            other => self.shape_violation(i, other),
        }
    }

    /// Operand `i`, which the table declares as `u32`.
    pub fn u32(&self, i: usize) -> u32 {
        match self.operands()[i] {
            Operand::U32(v) => v,
            other => self.shape_violation(i, other),
        }
    }

    /// Operand `i`, which the table declares as `i64`.
    pub fn i64(&self, i: usize) -> i64 {
        match self.operands()[i] {
            Operand::I64(v) => v,
            other => self.shape_violation(i, other),
        }
    }

    /// Operand `i`, which the table declares as `u64`.
    pub fn u64(&self, i: usize) -> u64 {
        match self.operands()[i] {
            Operand::U64(v) => v,
            other => self.shape_violation(i, other),
        }
    }

    // Decoding follows the table, so a mismatch means the executor and the
    // table disagree about an opcode.
    fn shape_violation(&self, i: usize, found: Operand) -> ! {
        panic!(
            "{} operand {i} is {}, executor asked for another width",
            self.opcode.name(),
            found.ty()
        )
    }
}

/// Decode the instruction starting at `ip`.
///
/// `ip` must be an instruction boundary; decoding from the middle of an
/// instruction yields garbage (or an error), never a checked diagnosis.
pub fn decode_one(code: &[u8], ip: u32) -> Result<Instruction, CodecError> {
    let start = ip as usize;
    let Some(&tag) = code.get(start) else {
        return Err(CodecError::Truncated {
            ip,
            needed: 1,
            available: code.len().saturating_sub(start),
        });
    };
    let opcode = Opcode::from_u8(tag).ok_or(CodecError::UnknownOpcode { ip, byte: tag })?;
    let def = opcode.def();

    let needed = def.encoded_len();
    let available = code.len() - start;
    if available < needed {
        return Err(CodecError::Truncated {
            ip,
            needed,
            available,
        });
    }

    let mut operands = [Operand::U8(0); MAX_OPERANDS];
    let mut cursor = start + 1;
    for (slot, operand) in def.operands.iter().zip(operands.iter_mut()) {
        *operand = Operand::read(slot.ty, &code[cursor..]);
        cursor += slot.ty.width();
    }

    Ok(Instruction {
        opcode,
        ip,
        next_ip: cursor as u32,
        operands,
        len: def.operands.len() as u8,
    })
}

/// Sequential decoder over a whole stream.
///
/// Yields each instruction from `ip = 0` to the end of the stream. After
/// the first error the iterator is exhausted.
pub struct Decoder<'a> {
    code: &'a [u8],
    ip: u32,
    failed: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            ip: 0,
            failed: false,
        }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Instruction, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.ip as usize >= self.code.len() {
            return None;
        }
        match decode_one(self.code, self.ip) {
            Ok(instr) => {
                self.ip = instr.next_ip;
                Some(Ok(instr))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
