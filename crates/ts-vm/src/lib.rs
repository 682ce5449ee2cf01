//! Register-plus-stack bytecode interpreter.
//!
//! This crate owns the instruction set and the dispatch loop only. It knows
//! nothing about the object tree, class hierarchy or garbage collector —
//! those live in `ts-runtime`, which reaches back into the interpreter
//! through the [`VmHost`] trait.

pub mod engine;
pub mod error;
pub mod host;
pub mod op_code;

pub use engine::ExecutionEngine;
pub use error::{VmError, VmResult};
pub use host::{CallTarget, VmHost};
pub use op_code::{OpCode, CALL_CACHE_SLOTS, OPTCALL_THRESHOLD};
