//! Object tree, garbage collector and embeddable API for the scripting
//! runtime built on top of `ts-core` and `ts-vm` (§3, §4.6-§4.9, §6).

mod clock;
mod error;
mod gc;
mod object;
mod object_manager;
mod sslib;
mod vm;

pub use clock::Clock;
pub use error::{RuntimeError, RuntimeResult, ScriptError, ScriptResult};
pub use object::{Object, Transform2D};
pub use object_manager::{NativeFn, ObjectManager, NATIVE_COLLECTION_CLASSES, SYSTEM_CLASSES};
pub use vm::Vm;
