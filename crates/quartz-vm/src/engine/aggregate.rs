//! Extern structs and unions held by value.
//!
//! An [`ExternAggregate`] owns its bytes. Cloning copies them, so `b = a`
//! followed by a write to `a` leaves `b` untouched; aliasing only happens
//! through an [`ExternPointer`](super::ExternPointer). Unions carry no tag:
//! every field reads the shared bytes as its own type, whichever field was
//! written last.

use std::fmt;
use std::sync::Arc;

use quartz_core::TypeId;

use super::error::RuntimeError;
use super::layout::{AggregateKind, AggregateLayout, FieldLayout};
use super::value::{Value, read_value, write_value};

#[derive(Clone, Debug, PartialEq)]
pub struct ExternAggregate {
    layout: Arc<AggregateLayout>,
    bytes: Box<[u8]>,
}

impl ExternAggregate {
    pub fn zeroed(layout: Arc<AggregateLayout>) -> Self {
        let bytes = vec![0u8; layout.size].into_boxed_slice();
        Self { layout, bytes }
    }

    /// Copy `bytes` (exactly `layout.size` long) into a new value.
    pub fn from_bytes(layout: Arc<AggregateLayout>, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), layout.size);
        Self {
            layout,
            bytes: bytes.into(),
        }
    }

    pub fn ty(&self) -> TypeId {
        self.layout.id
    }

    pub fn layout(&self) -> &Arc<AggregateLayout> {
        &self.layout
    }

    pub fn is_union(&self) -> bool {
        self.layout.kind == AggregateKind::Union
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read field `index`.
    pub fn get(&self, index: u16) -> Result<Value, RuntimeError> {
        let (_, field) = self.layout.field(index)?;
        Ok(self.read(field))
    }

    /// Write field `index`, narrowing scalars to the field type.
    pub fn set(&mut self, index: u16, value: &Value) -> Result<(), RuntimeError> {
        let layout = Arc::clone(&self.layout);
        let (_, field) = layout.field(index)?;
        write_value(&field.shape, value, &mut self.bytes[field.offset..])
    }

    pub fn get_named(&self, name: &str) -> Result<Value, RuntimeError> {
        let field = self.named(name)?;
        Ok(self.read(field))
    }

    pub fn set_named(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        let layout = Arc::clone(&self.layout);
        let field = layout
            .fields
            .get(name)
            .ok_or_else(|| self.unknown_field(name))?;
        write_value(&field.shape, value, &mut self.bytes[field.offset..])
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Value)> {
        self.layout
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), self.read(field)))
    }

    fn read(&self, field: &FieldLayout) -> Value {
        read_value(&field.shape, &self.bytes[field.offset..])
    }

    fn named(&self, name: &str) -> Result<&FieldLayout, RuntimeError> {
        self.layout
            .fields
            .get(name)
            .ok_or_else(|| self.unknown_field(name))
    }

    fn unknown_field(&self, name: &str) -> RuntimeError {
        RuntimeError::UnknownField {
            aggregate: self.layout.name.clone(),
            field: name.to_string(),
        }
    }
}

impl fmt::Display for ExternAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.layout.name)?;
        for (i, (name, value)) in self.fields().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{name}: {value}")?;
        }
        f.write_str(" }")
    }
}
