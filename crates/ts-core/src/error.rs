//! Error types shared by the value model, heap, stack, program pool and tag system.

use thiserror::Error;

/// Errors raised by the data-model layer (variable conversions, heap, stack,
/// program pool, tag system). These are always fatal from the VM's point of
/// view; the caller is expected to route them to the host's fatal hook.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Attempted to read a heap slot that was never allocated or was freed.
    #[error("heap slot {address} is empty (object heap size {size})")]
    EmptyHeapSlot { address: usize, size: usize },

    /// Heap grew past its configured ceiling.
    #[error("heap ceiling of {ceiling} slots exceeded")]
    HeapCeilingExceeded { ceiling: usize },

    /// Stack push would exceed the configured stack size.
    #[error("stack overflow: stack size {size} exceeded")]
    StackOverflow { size: usize },

    /// Stack pop attempted on an empty stack.
    #[error("stack underflow: attempted to pop an empty stack")]
    StackUnderflow,

    /// `speek`/`spoke` addressed a cell outside of `[0, sp]`.
    #[error("stack address {address} out of range (sp = {sp})")]
    StackAddressOutOfRange { address: i64, sp: usize },

    /// A variable was read with the wrong tag.
    #[error("expected a {expected} value, found {actual}")]
    WrongTag { expected: &'static str, actual: &'static str },

    /// A class name or function name failed the name-validation rules.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The program pool was asked to replace a program that already ran.
    #[error("program {class}.{function}/{arity} is frozen and cannot be replaced")]
    ProgramFrozen {
        class: String,
        function: String,
        arity: usize,
    },

    /// No such `(class, function, arity)` triple is registered.
    #[error("no such function {class}.{function}/{arity}")]
    MissingFunction {
        class: String,
        function: String,
        arity: usize,
    },

    /// The pool was queried for class ids before being frozen, or frozen twice.
    #[error("program pool class-id error: {reason}")]
    PoolState { reason: &'static str },

    /// Perfect-hash seeding failed to find a collision-free seed.
    #[error("could not find a perfect-hash seed for {class_count} classes after {attempts} attempts")]
    PerfectHashFailed { class_count: usize, attempts: u32 },

    /// A tag name was empty or otherwise invalid.
    #[error("invalid tag name {name:?}")]
    InvalidTag { name: String },
}

/// Convenience alias used throughout `ts-core`.
pub type CoreResult<T> = Result<T, CoreError>;
