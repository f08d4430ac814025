//! Callable references and host-provided native procedures.
//!
//! A proc slot in extern memory holds a code word and, for closures, a
//! context word. The code word tags what it refers to in its top bits:
//! `0` is nil, the top bit marks a native, the bit below it an interpreted
//! routine. The low bits are the routine or native index.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use quartz_bytecode::{NativeId, RoutineId};

use super::error::RuntimeError;
use super::layout::TypeLayouts;
use super::memory::Memory;
use super::value::Value;

const NATIVE_TAG: u64 = 1 << (usize::BITS - 1);
const ROUTINE_TAG: u64 = 1 << (usize::BITS - 2);
const INDEX_MASK: u64 = u16::MAX as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcTarget {
    Routine(RoutineId),
    Native(NativeId),
}

/// A proc value: what to call, plus the closure context (0 if none).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcRef {
    pub target: Option<ProcTarget>,
    pub context: u64,
}

impl ProcRef {
    pub fn routine(id: RoutineId) -> Self {
        Self {
            target: Some(ProcTarget::Routine(id)),
            context: 0,
        }
    }

    pub fn native(id: NativeId) -> Self {
        Self {
            target: Some(ProcTarget::Native(id)),
            context: 0,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.target.is_none()
    }

    pub(crate) fn code_word(&self) -> u64 {
        match self.target {
            None => 0,
            Some(ProcTarget::Routine(id)) => ROUTINE_TAG | id.0 as u64,
            Some(ProcTarget::Native(id)) => NATIVE_TAG | id.0 as u64,
        }
    }

    /// Inverse of [`code_word`](Self::code_word). Untagged non-zero words
    /// (e.g. garbage written through a union) read as nil.
    pub(crate) fn from_words(code: u64, context: u64) -> Self {
        let index = (code & INDEX_MASK) as u16;
        let target = if code & NATIVE_TAG != 0 {
            Some(ProcTarget::Native(NativeId(index)))
        } else if code & ROUTINE_TAG != 0 {
            Some(ProcTarget::Routine(RoutineId(index)))
        } else {
            None
        };
        Self { target, context }
    }
}

impl fmt::Display for ProcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            None => f.write_str("nil proc")?,
            Some(ProcTarget::Routine(id)) => write!(f, "proc routine#{}", id.0)?,
            Some(ProcTarget::Native(id)) => write!(f, "proc native#{}", id.0)?,
        }
        if self.context != 0 {
            write!(f, " ctx 0x{:x}", self.context)?;
        }
        Ok(())
    }
}

/// Arguments of a native call.
pub struct NativeCall<'a> {
    pub name: &'a str,
    /// Already narrowed to the declared parameter types.
    pub args: &'a [Value],
    /// Closure context word, 0 for plain procs.
    pub context: u64,
    pub memory: &'a mut Memory,
    pub layouts: &'a TypeLayouts,
}

pub type NativeFn = Arc<dyn Fn(NativeCall<'_>) -> Result<Value, RuntimeError> + Send + Sync>;

/// Host callbacks by symbol name.
///
/// A unit lists the native symbols it uses; they are resolved against a
/// registry once, when the VM is built.
#[derive(Clone, Default)]
pub struct NativeRegistry {
    fns: IndexMap<String, NativeFn>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(NativeCall<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.fns.insert(name.into(), Arc::new(f));
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.fns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fns.keys()).finish()
    }
}
