//! The opcode table.
//!
//! One declaration per opcode: display name, ordered operand descriptors,
//! and an optional display-only derivation. The codec, the assembler and
//! the disassembler read everything they need from [`OpcodeDef`]; adding an
//! opcode means adding one line to the `opcodes!` invocation below (plus
//! its execution semantics in the VM).

use quartz_core::ScalarKind;

use super::operand::{Operand, OperandType};

/// Position of the instruction being displayed.
#[derive(Clone, Copy, Debug)]
pub struct DeriveCtx {
    pub ip: u32,
    pub next_ip: u32,
}

/// Computes an extra display field from raw operands. Never affects
/// encoding or execution.
pub type DeriveFn = fn(&DeriveCtx, &[Operand]) -> String;

/// Named, typed operand slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperandDef {
    pub name: &'static str,
    pub ty: OperandType,
}

/// Table entry for one opcode.
#[derive(Clone, Copy, Debug)]
pub struct OpcodeDef {
    pub opcode: Opcode,
    pub name: &'static str,
    pub operands: &'static [OperandDef],
    pub derive: Option<DeriveFn>,
}

impl OpcodeDef {
    /// Total encoded length: tag byte plus operand widths.
    pub fn encoded_len(&self) -> usize {
        1 + self.operands.iter().map(|o| o.ty.width()).sum::<usize>()
    }

    /// Byte offset of operand `index` relative to the instruction start.
    pub fn operand_offset(&self, index: usize) -> usize {
        1 + self.operands[..index]
            .iter()
            .map(|o| o.ty.width())
            .sum::<usize>()
    }
}

macro_rules! opcodes {
    (@derive) => { None };
    (@derive $derive:path) => { Some($derive as DeriveFn) };
    ($(
        $(#[$meta:meta])*
        $variant:ident = $name:literal ( $( $operand:ident : $ty:ident ),* ) $( => $derive:path )? ;
    )*) => {
        /// Instruction opcodes. The discriminant is the tag byte in the stream.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$meta])* $variant, )*
        }

        impl Opcode {
            /// All opcodes in tag order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];
        }

        static TABLE: &[OpcodeDef] = &[
            $(
                OpcodeDef {
                    opcode: Opcode::$variant,
                    name: $name,
                    operands: &[
                        $( OperandDef { name: stringify!($operand), ty: OperandType::$ty }, )*
                    ],
                    derive: opcodes!(@derive $( $derive )?),
                },
            )*
        ];
    };
}

opcodes! {
    Nop = "NOP" ();

    // Stack
    PushI64 = "PUSH_I64" (value: I64);
    PushU64 = "PUSH_U64" (value: U64);
    /// Raw IEEE-754 bits.
    PushF64 = "PUSH_F64" (bits: U64) => derive_f64;
    PushBool = "PUSH_BOOL" (value: U8) => derive_bool;
    /// Zero-initialized value of any type (`Struct.new`, null pointer, nil proc).
    PushZero = "PUSH_ZERO" (ty: U16);
    Pop = "POP" ();
    Dup = "DUP" ();
    Swap = "SWAP" ();

    // Locals
    LocalGet = "LOCAL_GET" (slot: U16);
    LocalSet = "LOCAL_SET" (slot: U16);
    /// `pointerof(local)`.
    LocalAddr = "LOCAL_ADDR" (slot: U16);

    // Arithmetic and comparison
    Add = "ADD" ();
    Sub = "SUB" ();
    Mul = "MUL" ();
    CmpLt = "LT" ();
    CmpEq = "EQ" ();
    Not = "NOT" ();
    /// Packed scalar codes: `from << 4 | to`.
    Cast = "CAST" (kinds: U8) => derive_cast;

    // Control flow
    Jump = "JUMP" (target: U32) => derive_jump;
    JumpIfFalse = "JUMP_IF_FALSE" (target: U32) => derive_jump;
    Call = "CALL" (routine: U16);
    Return = "RETURN" ();

    // Constant pool
    ConstGet = "CONST_GET" (offset: U32) => derive_const_slot;

    // Extern values
    FieldGet = "FIELD_GET" (ty: U16, field: U16);
    /// Writes into the aggregate on the stack, a copy owned by nobody else.
    FieldSet = "FIELD_SET" (ty: U16, field: U16);
    FieldAddr = "FIELD_ADDR" (ty: U16, field: U16);
    Load = "LOAD" (ty: U16);
    Store = "STORE" (ty: U16);
    Malloc = "MALLOC" (ty: U16, count: U32);
    PtrIndex = "PTR_INDEX" (ty: U16);
    ProcRef = "PROC_REF" (routine: U16, ty: U16);
    NativeRef = "NATIVE_REF" (native: U16, ty: U16);
    ProcContext = "PROC_CONTEXT" ();
    CallProc = "CALL_PROC" (ty: U16);
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    #[inline]
    pub fn def(self) -> &'static OpcodeDef {
        &TABLE[self as usize]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.def().name
    }
}

/// Pack a `CAST` operand.
pub fn pack_cast(from: ScalarKind, to: ScalarKind) -> u8 {
    (from.code() << 4) | to.code()
}

/// Unpack a `CAST` operand; `None` if either code is unknown.
pub fn unpack_cast(packed: u8) -> Option<(ScalarKind, ScalarKind)> {
    Some((
        ScalarKind::from_code(packed >> 4)?,
        ScalarKind::from_code(packed & 0xF)?,
    ))
}

fn derive_f64(_: &DeriveCtx, operands: &[Operand]) -> String {
    format!("{:?}", f64::from_bits(operands[0].bits()))
}

fn derive_bool(_: &DeriveCtx, operands: &[Operand]) -> String {
    (operands[0].bits() != 0).to_string()
}

fn derive_cast(_: &DeriveCtx, operands: &[Operand]) -> String {
    match unpack_cast(operands[0].bits() as u8) {
        Some((from, to)) => format!("{}->{}", from.name(), to.name()),
        None => "?->?".to_string(),
    }
}

fn derive_jump(ctx: &DeriveCtx, operands: &[Operand]) -> String {
    let delta = operands[0].bits() as i64 - ctx.next_ip as i64;
    format!("{delta:+}")
}

fn derive_const_slot(_: &DeriveCtx, operands: &[Operand]) -> String {
    let offset = operands[0].bits();
    format!("flag@{offset} data@{}", offset + 1)
}
