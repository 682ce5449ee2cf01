//! Value model, heap, stack, program pool, tag system and shared utilities
//! for the treescript runtime.
//!
//! This crate has no knowledge of opcodes (that's `ts-vm`), parsing (that's
//! `ts-compiler`) or the object tree (that's `ts-runtime`) — it only models
//! the data structures those crates build on.

pub mod config;
pub mod error;
pub mod hash;
pub mod heap;
pub mod program;
pub mod program_pool;
pub mod rng;
pub mod stack;
pub mod string_pool;
pub mod tag_system;
pub mod variable;

pub use config::VmConfig;
pub use error::{CoreError, CoreResult};
pub use heap::Heap;
pub use program::{Operation, Program, ProgramBody};
pub use program_pool::ProgramPool;
pub use stack::Stack;
pub use string_pool::StringPool;
pub use tag_system::{BoundTagSystem, TagSystem};
pub use variable::{Handle, Variable, NULL_HANDLE, ROOT_HANDLE};
