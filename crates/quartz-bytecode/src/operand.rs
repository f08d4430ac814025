//! Operand types and values.
//!
//! Every operand is fixed-width and little-endian in the instruction
//! stream, independent of the host byte order.

use std::fmt;

/// Declared type of an operand slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OperandType {
    U8,
    U16,
    U32,
    I64,
    U64,
}

impl OperandType {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::I64 | Self::U64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
        }
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded (or to-be-encoded) operand value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operand {
    U8(u8),
    U16(u16),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl Operand {
    pub fn ty(self) -> OperandType {
        match self {
            Self::U8(_) => OperandType::U8,
            Self::U16(_) => OperandType::U16,
            Self::U32(_) => OperandType::U32,
            Self::I64(_) => OperandType::I64,
            Self::U64(_) => OperandType::U64,
        }
    }

    /// Append the little-endian encoding.
    pub fn write_to(self, out: &mut Vec<u8>) {
        match self {
            Self::U8(v) => out.push(v),
            Self::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Read an operand of type `ty` from the front of `bytes`.
    ///
    /// The caller guarantees `bytes.len() >= ty.width()`.
    pub fn read(ty: OperandType, bytes: &[u8]) -> Self {
        match ty {
            OperandType::U8 => Self::U8(bytes[0]),
            OperandType::U16 => Self::U16(u16::from_le_bytes(le_array(bytes))),
            OperandType::U32 => Self::U32(u32::from_le_bytes(le_array(bytes))),
            OperandType::I64 => Self::I64(i64::from_le_bytes(le_array(bytes))),
            OperandType::U64 => Self::U64(u64::from_le_bytes(le_array(bytes))),
        }
    }

    /// Zero-extended raw bits (sign bits preserved for `I64`).
    pub fn bits(self) -> u64 {
        match self {
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::I64(v) => v as u64,
            Self::U64(v) => v,
        }
    }
}

#[inline]
fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
        }
    }
}

impl From<u8> for Operand {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<u16> for Operand {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for Operand {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Operand {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}
