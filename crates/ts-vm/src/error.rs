//! Errors raised while an [`ExecutionEngine`](crate::engine::ExecutionEngine)
//! runs a program. Mirrors [`ts_core::CoreError`] at the level above: a
//! `VmError` either wraps a `CoreError` bubbled up from the stack/heap, or
//! names a fault specific to instruction dispatch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Core(#[from] ts_core::CoreError),

    #[error("unknown opcode byte {byte:#04x} at instruction {index}")]
    UnknownOpcode { byte: u8, index: usize },

    #[error("jump target {target} is out of range for a program of {len} instructions")]
    JumpOutOfRange { target: usize, len: usize },

    #[error("register index {index} is out of range (registers are t0..=t3)")]
    RegisterOutOfRange { index: usize },

    #[error("call to unresolved function {name:?}/{arity} on object {handle}")]
    UnresolvedFunction { name: String, arity: usize, handle: ts_core::Handle },

    #[error("division by zero")]
    DivideByZero,

    #[error("call stack depth exceeded {limit} frames, likely unbounded recursion")]
    CallDepthExceeded { limit: usize },

    #[error("OPTCALL at instruction {index} has no cached program but was dispatched as cached")]
    StaleOptcall { index: usize },

    #[error("host rejected the operation: {0}")]
    Host(String),
}

pub type VmResult<T> = Result<T, VmError>;
