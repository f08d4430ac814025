//! Runtime values and their extern-memory representation.
//!
//! On the value stack, scalars are widened: every signed integer kind is an
//! [`Value::Int`], every unsigned kind a [`Value::UInt`], both float kinds a
//! [`Value::Float`]. Narrowing happens only when a value is written into
//! extern memory (a field, a local slot, a pointee, a constant, a proc
//! argument), with the host's C conversion semantics: integers keep their
//! low-order bits, floats truncate toward zero. Reading widens again.

use std::fmt;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use quartz_core::ScalarKind;

use super::aggregate::ExternAggregate;
use super::error::RuntimeError;
use super::layout::{Shape, WORD};
use super::pointer::ExternPointer;
use super::proc::{ProcRef, ProcTarget};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Result of a routine without a return type.
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Pointer(ExternPointer),
    Proc(ProcRef),
    Aggregate(ExternAggregate),
}

impl Value {
    pub fn kind_name(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::UInt(_) => "uint".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Pointer(p) => format!("{}*", p.pointee),
            Self::Proc(_) => "proc".to_string(),
            Self::Aggregate(a) => format!("`{}`", a.layout().name),
        }
    }

    /// Integer view used for indices and context words.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => Some(*v as i64),
            _ => None,
        }
    }
}

pub(crate) fn mismatch(expected: impl Into<String>, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.into(),
        found: found.kind_name(),
    }
}

/// Numeric view of a scalar-ish value before narrowing.
#[derive(Clone, Copy)]
enum Num {
    I(i64),
    U(u64),
    F(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::U(*b as u64)),
            Value::Int(v) => Some(Self::I(*v)),
            Value::UInt(v) => Some(Self::U(*v)),
            Value::Float(v) => Some(Self::F(*v)),
            _ => None,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::I(v) => v == 0,
            Self::U(v) => v == 0,
            Self::F(v) => v == 0.0,
        }
    }
}

macro_rules! narrow {
    ($num:expr, $t:ty) => {
        match $num {
            Num::I(v) => v as $t,
            Num::U(v) => v as $t,
            Num::F(v) => v as $t,
        }
    };
}

#[inline]
fn ne<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

fn read_word(bytes: &[u8]) -> u64 {
    usize::from_ne_bytes(ne(bytes)) as u64
}

fn write_word(out: &mut [u8], word: u64) -> Result<(), RuntimeError> {
    let word = usize::try_from(word).map_err(|_| RuntimeError::InvalidAddress(word))?;
    out[..WORD].copy_from_slice(&word.to_ne_bytes());
    Ok(())
}

/// Read a value of `shape` from the front of `bytes`.
///
/// The caller guarantees `bytes.len() >= shape.size()`.
pub fn read_value(shape: &Shape, bytes: &[u8]) -> Value {
    match shape {
        Shape::Scalar(kind) => read_scalar(*kind, bytes),
        Shape::Pointer { pointee } => {
            Value::Pointer(ExternPointer::new(read_word(bytes), *pointee))
        }
        Shape::Proc { closure } => {
            let context = if *closure { read_word(&bytes[WORD..]) } else { 0 };
            Value::Proc(ProcRef::from_words(read_word(bytes), context))
        }
        Shape::Aggregate(layout) => Value::Aggregate(ExternAggregate::from_bytes(
            layout.clone(),
            &bytes[..layout.size],
        )),
    }
}

fn read_scalar(kind: ScalarKind, b: &[u8]) -> Value {
    match kind {
        ScalarKind::Bool => Value::Bool(b[0] != 0),
        ScalarKind::I8 => Value::Int(i8::from_ne_bytes(ne(b)) as i64),
        ScalarKind::I16 => Value::Int(i16::from_ne_bytes(ne(b)) as i64),
        ScalarKind::I32 => Value::Int(i32::from_ne_bytes(ne(b)) as i64),
        ScalarKind::I64 => Value::Int(i64::from_ne_bytes(ne(b))),
        ScalarKind::U8 => Value::UInt(b[0] as u64),
        ScalarKind::U16 => Value::UInt(u16::from_ne_bytes(ne(b)) as u64),
        ScalarKind::U32 => Value::UInt(u32::from_ne_bytes(ne(b)) as u64),
        ScalarKind::U64 => Value::UInt(u64::from_ne_bytes(ne(b))),
        ScalarKind::F32 => Value::Float(f32::from_ne_bytes(ne(b)) as f64),
        ScalarKind::F64 => Value::Float(f64::from_ne_bytes(ne(b))),
    }
}

/// Write `value` as `shape` into the front of `out`, narrowing scalars.
///
/// Nothing is written if the value does not fit the shape at all.
pub fn write_value(shape: &Shape, value: &Value, out: &mut [u8]) -> Result<(), RuntimeError> {
    match (shape, value) {
        (Shape::Scalar(kind), _) => {
            let num = Num::of(value).ok_or_else(|| mismatch(kind.name(), value))?;
            write_scalar(*kind, num, out);
            Ok(())
        }
        // Pointer slots accept any pointee, like a C cast.
        (Shape::Pointer { .. }, Value::Pointer(p)) => write_word(out, p.address),
        (Shape::Proc { closure }, Value::Proc(p)) => {
            if !closure && p.context != 0 {
                return Err(RuntimeError::ClosureContext);
            }
            write_word(out, p.code_word())?;
            if *closure {
                write_word(&mut out[WORD..], p.context)?;
            }
            Ok(())
        }
        (Shape::Aggregate(layout), Value::Aggregate(a)) if a.ty() == layout.id => {
            out[..layout.size].copy_from_slice(a.bytes());
            Ok(())
        }
        _ => Err(mismatch(shape.describe(), value)),
    }
}

fn write_scalar(kind: ScalarKind, num: Num, out: &mut [u8]) {
    match kind {
        ScalarKind::Bool => out[0] = !num.is_zero() as u8,
        ScalarKind::I8 => out[..1].copy_from_slice(&narrow!(num, i8).to_ne_bytes()),
        ScalarKind::U8 => out[0] = narrow!(num, u8),
        ScalarKind::I16 => out[..2].copy_from_slice(&narrow!(num, i16).to_ne_bytes()),
        ScalarKind::U16 => out[..2].copy_from_slice(&narrow!(num, u16).to_ne_bytes()),
        ScalarKind::I32 => out[..4].copy_from_slice(&narrow!(num, i32).to_ne_bytes()),
        ScalarKind::U32 => out[..4].copy_from_slice(&narrow!(num, u32).to_ne_bytes()),
        ScalarKind::I64 => out[..8].copy_from_slice(&narrow!(num, i64).to_ne_bytes()),
        ScalarKind::U64 => out[..8].copy_from_slice(&narrow!(num, u64).to_ne_bytes()),
        ScalarKind::F32 => out[..4].copy_from_slice(&narrow!(num, f32).to_ne_bytes()),
        ScalarKind::F64 => out[..8].copy_from_slice(&narrow!(num, f64).to_ne_bytes()),
    }
}

/// Round-trip `value` through `shape`: what reading it back after a store
/// would yield.
pub fn coerce(shape: &Shape, value: &Value) -> Result<Value, RuntimeError> {
    let mut buf = vec![0u8; shape.size()];
    write_value(shape, value, &mut buf)?;
    Ok(read_value(shape, &buf))
}

/// The all-zero value of `shape` (`Struct.new`, null, nil proc).
pub fn zero_value(shape: &Shape) -> Value {
    read_value(shape, &vec![0u8; shape.size()])
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Pointer(p) => write!(f, "{p}"),
            Self::Proc(p) => write!(f, "{p}"),
            Self::Aggregate(a) => write!(f, "{a}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Void => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Pointer(p) => {
                let mut state = serializer.serialize_struct("Pointer", 2)?;
                state.serialize_field("address", &p.address)?;
                state.serialize_field("pointee", &p.pointee)?;
                state.end()
            }
            Self::Proc(p) => {
                let target = p.target.map(|t| match t {
                    ProcTarget::Routine(id) => format!("routine#{}", id.0),
                    ProcTarget::Native(id) => format!("native#{}", id.0),
                });
                let mut state = serializer.serialize_struct("Proc", 2)?;
                state.serialize_field("target", &target)?;
                state.serialize_field("context", &p.context)?;
                state.end()
            }
            Self::Aggregate(a) => {
                let mut map = serializer.serialize_map(Some(a.layout().fields.len()))?;
                for (name, value) in a.fields() {
                    map.serialize_entry(name, &value)?;
                }
                map.end()
            }
        }
    }
}
