//! Errors raised by the object manager, garbage collector, plugin
//! installation, and the embeddable API surface (§3.1).

use thiserror::Error;
use ts_core::Handle;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Vm(#[from] ts_vm::VmError),

    #[error(transparent)]
    Core(#[from] ts_core::CoreError),

    #[error("no live object at handle {0}")]
    UnknownHandle(Handle),

    #[error("cannot spawn the root class {0:?} from script")]
    CannotSpawnRoot(String),

    #[error("no such class {0:?} is registered")]
    UnknownClass(String),

    #[error("{0}.reparent is not supported; spawn a replacement child and destroy the old one instead")]
    ReparentNotSupported(String),

    #[error("class-id assignment failed: {0}")]
    ClassIdAssignment(String),

    #[error("script crash in {object}: {message}")]
    ScriptCrash { object: String, message: String },

    #[error("native function {class}.{function}/{arity} raised: {reason}")]
    Native { class: String, function: String, arity: usize, reason: String },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Umbrella error at the embeddable API boundary: compiling a script can fail
/// at parse time, everything past that point fails (if at all) at runtime.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Compile(#[from] ts_compiler::CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type ScriptResult<T> = Result<T, ScriptError>;
