//! Errors that can occur during execution.

use quartz_bytecode::CodecError;
use quartz_core::TypeError;

use super::constants::PoolError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Execution fuel exhausted (too many instructions).
    #[error("runtime execution limit exceeded ({0} steps)")]
    ExecFuelExhausted(u32),

    /// Too many nested calls.
    #[error("runtime recursion limit exceeded ({0} frames)")]
    RecursionLimitExceeded(u32),

    #[error("value stack underflow at {0:04}")]
    StackUnderflow(u32),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("`{routine}` expects {expected} arguments, got {got}")]
    ArityMismatch {
        routine: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid cast operand 0x{0:02x}")]
    InvalidCast(u8),

    /// Address outside any live block (dangling, out of bounds, or forged).
    #[error("invalid address 0x{0:x}")]
    InvalidAddress(u64),

    #[error("null pointer dereference")]
    NullDereference,

    #[error("allocation of {0} bytes exceeds the block size limit")]
    AllocationTooLarge(usize),

    #[error("call through nil proc")]
    NilProc,

    #[error("cannot store a closure context in a non-closure proc")]
    ClosureContext,

    #[error("routine #{0} cannot receive a closure context")]
    RoutineContext(u16),

    #[error("aggregate `{aggregate}` has no field `{field}`")]
    UnknownField { aggregate: String, field: String },

    #[error("`{routine}` has no local slot {slot}")]
    UnknownLocal { routine: String, slot: u16 },

    #[error("unknown routine #{0}")]
    UnknownRoutine(u16),

    #[error("unknown native `{0}`")]
    UnknownNative(String),

    /// Raised by native callbacks.
    #[error("native `{name}` failed: {message}")]
    Native { name: String, message: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Type(#[from] TypeError),
}
