//! Constant pool: storage for lazily initialized global constants.
//!
//! Each declared constant reserves `1 + size` bytes: an init flag byte
//! (non-zero once initialized) followed by the value bytes. Offsets are
//! assigned in declaration order and never overlap.
//!
//! The pool only stores; the VM drives the protocol. On `CONST_GET` it
//! checks the flag, runs the bound initializer if the flag is clear,
//! stores the result and sets the flag. A VM borrows the pool mutably for
//! a whole execution, so several execution contexts share one pool through
//! a [`SharedPool`] and the check-then-initialize sequence never races.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use quartz_bytecode::{CompiledUnit, RoutineId};
use quartz_core::TypeId;

use super::error::RuntimeError;
use super::layout::TypeLayouts;

/// A pool shared by several execution contexts.
pub type SharedPool = Arc<Mutex<ConstantPool>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("constant `{0}` declared twice")]
    AlreadyDeclared(String),
    #[error("no constant declared at offset {0}")]
    UndeclaredOffset(u32),
    #[error("no initializer bound at offset {0}")]
    MissingInitializer(u32),
    #[error("constant at offset {0} is already initialized")]
    AlreadyInitialized(u32),
    #[error("value for offset {offset} is {got} bytes, expected {expected}")]
    SizeMismatch {
        offset: u32,
        expected: usize,
        got: usize,
    },
    #[error("constant `{name}` was compiled for offset {compiled}, pool assigned {assigned}")]
    OffsetMismatch {
        name: String,
        compiled: u32,
        assigned: u32,
    },
}

/// What the pool knows about one constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEntry {
    pub name: String,
    pub ty: TypeId,
    pub offset: u32,
    pub size: usize,
    pub initializer: RoutineId,
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    storage: Vec<u8>,
    entries: IndexMap<String, PoolEntry>,
    by_offset: HashMap<u32, usize>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool with every constant of `unit` declared, checking that the
    /// offsets match the ones the compiler baked into `CONST_GET`.
    pub fn for_unit(unit: &CompiledUnit) -> Result<Self, RuntimeError> {
        let layouts = TypeLayouts::compute(&unit.types)?;
        let mut pool = Self::new();
        for decl in &unit.constants {
            let size = layouts.size_of(decl.ty)?;
            let assigned = pool.declare(&decl.name, decl.ty, size, decl.initializer)?;
            if assigned != decl.offset {
                return Err(PoolError::OffsetMismatch {
                    name: decl.name.clone(),
                    compiled: decl.offset,
                    assigned,
                }
                .into());
            }
        }
        Ok(pool)
    }

    pub fn into_shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    /// Reserve storage for a constant and bind its initializer.
    pub fn declare(
        &mut self,
        name: &str,
        ty: TypeId,
        size: usize,
        initializer: RoutineId,
    ) -> Result<u32, PoolError> {
        if self.entries.contains_key(name) {
            return Err(PoolError::AlreadyDeclared(name.to_string()));
        }

        let offset = self.storage.len() as u32;
        self.storage.resize(self.storage.len() + 1 + size, 0);
        self.by_offset.insert(offset, self.entries.len());
        self.entries.insert(
            name.to_string(),
            PoolEntry {
                name: name.to_string(),
                ty,
                offset,
                size,
                initializer,
            },
        );
        Ok(offset)
    }

    pub fn lookup_offset(&self, name: &str) -> Option<u32> {
        self.entries.get(name).map(|e| e.offset)
    }

    pub fn lookup_initializer(&self, offset: u32) -> Result<RoutineId, PoolError> {
        self.by_offset
            .get(&offset)
            .map(|i| self.entries[*i].initializer)
            .ok_or(PoolError::MissingInitializer(offset))
    }

    pub fn entry(&self, offset: u32) -> Result<&PoolEntry, PoolError> {
        self.by_offset
            .get(&offset)
            .map(|i| &self.entries[*i])
            .ok_or(PoolError::UndeclaredOffset(offset))
    }

    pub fn is_initialized(&self, offset: u32) -> Result<bool, PoolError> {
        self.entry(offset)?;
        Ok(self.storage[offset as usize] != 0)
    }

    /// Value bytes of the constant at `offset` (zero until initialized).
    pub fn data(&self, offset: u32) -> Result<&[u8], PoolError> {
        let entry = self.entry(offset)?;
        let start = offset as usize + 1;
        Ok(&self.storage[start..start + entry.size])
    }

    /// Store the initializer's result and set the flag. Once set, the flag
    /// stays set for the life of the pool.
    pub fn store(&mut self, offset: u32, bytes: &[u8]) -> Result<(), PoolError> {
        let size = self.entry(offset)?.size;
        if self.is_initialized(offset)? {
            return Err(PoolError::AlreadyInitialized(offset));
        }
        if bytes.len() != size {
            return Err(PoolError::SizeMismatch {
                offset,
                expected: size,
                got: bytes.len(),
            });
        }

        let start = offset as usize + 1;
        self.storage[start..start + size].copy_from_slice(bytes);
        self.storage[offset as usize] = 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total reserved bytes, flags included.
    pub fn storage_size(&self) -> usize {
        self.storage.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.values()
    }
}
