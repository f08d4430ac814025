#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Bytecode format for the Quartz interpreter.
//!
//! This crate contains:
//! - The opcode table, the single source of operand layout
//! - A table-driven codec (encode, decode at any instruction boundary)
//! - An assembler with labels for building instruction streams
//! - The disassembler used by `dump` and by the VM tracer
//! - The compiled-unit container (code, source map, types, routines)

mod assembler;
mod codec;
mod dump;
mod header;
mod opcodes;
mod operand;
mod source_map;
mod unit;

#[cfg(test)]
mod codec_tests;
#[cfg(test)]
mod dump_tests;
#[cfg(test)]
mod header_tests;

pub use assembler::{Assembler, Label};
pub use codec::{CodecError, Decoder, Instruction, MAX_OPERANDS, decode_one, encode, encode_into};
pub use dump::{IP_WIDTH, disassemble, disassemble_colored, dump_unit, format_instruction};
pub use header::{HEADER_SIZE, Header, MAGIC, VERSION};
pub use opcodes::{DeriveCtx, DeriveFn, Opcode, OpcodeDef, OperandDef, pack_cast, unpack_cast};
pub use operand::{Operand, OperandType};
pub use source_map::{SourceMap, SourceNode};
pub use unit::{CompiledUnit, ConstantDecl, NativeId, Routine, RoutineId, UnitError};
