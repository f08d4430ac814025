//! Runtime VM for executing Quartz bytecode.
//!
//! This crate provides the interpreter loop, the lazily initialized
//! constant pool, and the extern value model: C-compatible structs, unions,
//! pointers and procs living in interpreter-managed memory.

pub mod engine;

// Re-export commonly used items at crate root
pub use engine::{
    AggregateKind, AggregateLayout, ConstantPool, ExternAggregate, ExternPointer, FieldLayout,
    FuelLimits, Memory, NativeCall, NativeFn, NativeRegistry, NoopTracer, PoolEntry, PoolError,
    PrintTracer, ProcRef, ProcTarget, RuntimeError, Shape, SharedPool, Tracer, TypeLayouts, VM,
    VMBuilder, Value, Verbosity,
};
