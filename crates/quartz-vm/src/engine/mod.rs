//! Execution engine.
//!
//! Leaves first: type layouts and raw memory, then extern values on top of
//! them, then the constant pool, and finally the VM that ties everything
//! together under a [`Tracer`].

mod aggregate;
mod constants;
mod error;
mod frame;
mod layout;
mod memory;
mod pointer;
mod proc;
mod trace;
mod value;
mod vm;

#[cfg(test)]
mod memory_tests;
#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod trace_tests;

pub use aggregate::ExternAggregate;
pub use constants::{ConstantPool, PoolEntry, PoolError, SharedPool};
pub use error::RuntimeError;
pub use layout::{AggregateKind, AggregateLayout, FieldLayout, Shape, TypeLayouts};
pub use memory::Memory;
pub use pointer::ExternPointer;
pub use proc::{NativeCall, NativeFn, NativeRegistry, ProcRef, ProcTarget};
pub use trace::{NoopTracer, PrintTracer, Tracer, Verbosity};
pub use value::Value;
pub use vm::{FuelLimits, VM, VMBuilder};
