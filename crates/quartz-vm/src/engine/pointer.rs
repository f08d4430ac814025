//! Extern pointers: an address plus a static pointee type.
//!
//! A pointer owns nothing. Loading copies the pointee out, storing writes
//! straight into the addressed bytes, and [`field`](ExternPointer::field)
//! yields another pointer into the same storage. That is how
//! `pointerof(a).value.x = 20` reaches `a`.

use std::fmt;

use quartz_core::TypeId;

use super::error::RuntimeError;
use super::layout::{Shape, TypeLayouts};
use super::memory::{Memory, offset_address};
use super::value::{Value, mismatch, read_value, write_value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternPointer {
    pub address: u64,
    pub pointee: TypeId,
}

impl ExternPointer {
    pub fn new(address: u64, pointee: TypeId) -> Self {
        Self { address, pointee }
    }

    pub fn null(pointee: TypeId) -> Self {
        Self::new(0, pointee)
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// Copy the pointee out of memory.
    pub fn load(&self, memory: &Memory, layouts: &TypeLayouts) -> Result<Value, RuntimeError> {
        let shape = layouts.shape(self.pointee)?;
        let bytes = memory.read(self.address, shape.size())?;
        Ok(read_value(shape, bytes))
    }

    /// Write `value` into the pointee, narrowing scalars.
    pub fn store(
        &self,
        memory: &mut Memory,
        layouts: &TypeLayouts,
        value: &Value,
    ) -> Result<(), RuntimeError> {
        let shape = layouts.shape(self.pointee)?;
        let out = memory.slice_mut(self.address, shape.size())?;
        write_value(shape, value, out)
    }

    /// Pointer to field `index` of the pointed-to aggregate.
    pub fn field(&self, layouts: &TypeLayouts, index: u16) -> Result<Self, RuntimeError> {
        let Shape::Aggregate(layout) = layouts.shape(self.pointee)? else {
            return Err(mismatch("struct or union pointer", &Value::Pointer(*self)));
        };
        let (_, field) = layout.field(index)?;
        let address = offset_address(self.address, field.offset as i64)?;
        Ok(Self::new(address, field.ty))
    }

    /// `self + index`, scaled by the pointee size.
    pub fn index(&self, layouts: &TypeLayouts, index: i64) -> Result<Self, RuntimeError> {
        let size = layouts.size_of(self.pointee)? as i64;
        let delta = index
            .checked_mul(size)
            .ok_or(RuntimeError::InvalidAddress(self.address))?;
        Ok(Self::new(offset_address(self.address, delta)?, self.pointee))
    }
}

impl fmt::Display for ExternPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null as {}*", self.pointee)
        } else {
            write!(f, "0x{:x} as {}*", self.address, self.pointee)
        }
    }
}
