//! Instruction stream builder.
//!
//! The lowering pass (and the tests) emit instructions through this instead
//! of concatenating [`encode`](super::encode) output by hand, so forward
//! jumps can target labels bound later.

use super::codec::{CodecError, encode_into};
use super::opcodes::Opcode;
use super::operand::Operand;
use super::source_map::{SourceMap, SourceNode};

/// Forward-referencable jump target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Default)]
pub struct Assembler {
    code: Vec<u8>,
    source_map: SourceMap,
    labels: Vec<Option<u32>>,
    /// (byte offset of the u32 target operand, label)
    fixups: Vec<(usize, Label)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// IP the next emitted instruction will have.
    pub fn ip(&self) -> u32 {
        self.code.len() as u32
    }

    /// Emit one instruction and return its IP.
    pub fn emit(&mut self, opcode: Opcode, operands: &[Operand]) -> Result<u32, CodecError> {
        let ip = self.ip();
        encode_into(&mut self.code, opcode, operands)?;
        Ok(ip)
    }

    /// Emit one instruction and record the node it came from.
    pub fn emit_with_node(
        &mut self,
        opcode: Opcode,
        operands: &[Operand],
        node: SourceNode,
    ) -> Result<u32, CodecError> {
        let ip = self.emit(opcode, operands)?;
        self.source_map.insert(ip, node);
        Ok(ip)
    }

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() as u32 - 1)
    }

    /// Bind `label` to the current IP. Rebinding moves the label.
    pub fn bind(&mut self, label: Label) {
        let ip = self.ip();
        self.labels[label.0 as usize] = Some(ip);
    }

    /// Emit a jump-like instruction whose first operand is a `u32` target,
    /// to be patched with `label`'s IP in [`finish`](Self::finish).
    pub fn emit_jump(&mut self, opcode: Opcode, label: Label) -> Result<u32, CodecError> {
        let def = opcode.def();
        // Shape check rejects anything but a single u32 operand.
        let ip = self.emit(opcode, &[Operand::U32(0)])?;
        self.fixups.push((ip as usize + def.operand_offset(0), label));
        Ok(ip)
    }

    /// Resolve labels and return the code plus its source map.
    pub fn finish(mut self) -> Result<(Vec<u8>, SourceMap), CodecError> {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target =
                self.labels[label.0 as usize].ok_or(CodecError::UnboundLabel(label.0))?;
            self.code[at..at + 4].copy_from_slice(&target.to_le_bytes());
        }
        Ok((self.code, self.source_map))
    }
}
