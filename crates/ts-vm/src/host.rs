//! The seam between this crate and the object tree.
//!
//! `ts-vm` only knows about registers, the shared stack and bytecode; it has
//! no notion of an object tree, a class hierarchy or a GC. Everything the
//! interpreter needs from that world — resolving `self`/`caller`, reaching an
//! object's private heap, looking up which program implements a called
//! function, dispatching to a natively bound function — is asked for through
//! `VmHost`. `ts-runtime`'s object manager implements it; tests in this crate
//! implement a trivial in-memory host so the interpreter can be exercised
//! without pulling in the whole runtime.

use std::rc::Rc;

use ts_core::{BoundTagSystem, Handle, Heap, ProgramPool, Variable};

use crate::error::VmResult;

/// Outcome of resolving a `CALL`/`OPTCALL` target.
pub enum CallTarget {
    /// A scripted function: run the named program in its own frame.
    Scripted { class_id: u32 },
    /// A function implemented directly by the host (primitive methods such
    /// as `String.length` or a native-bound sslib function). The host
    /// performs the call itself and hands back the result directly.
    Native(Variable),
}

pub trait VmHost {
    /// Class id of the object behind `handle`, used both to key the call-site
    /// cache and to look up the right program in the shared [`ProgramPool`].
    fn class_id_of(&self, handle: Handle) -> VmResult<u32>;

    /// Class name of the object behind `handle`; used to index [`ProgramPool`]
    /// (which is keyed by class name, not id) and to report errors.
    fn class_name_of(&self, handle: Handle) -> VmResult<Rc<str>>;

    fn heap(&self, handle: Handle) -> VmResult<&Heap>;
    fn heap_mut(&mut self, handle: Handle) -> VmResult<&mut Heap>;

    fn current_state(&self, handle: Handle) -> VmResult<Rc<str>>;
    fn set_state(&mut self, handle: Handle, state: Rc<str>) -> VmResult<()>;

    /// Handle of the object that called into `handle`'s currently running
    /// program, or [`ts_core::NULL_HANDLE`] if it was invoked by the host
    /// (e.g. a top-level state update).
    fn caller_of(&self, handle: Handle) -> VmResult<Handle>;

    fn program_pool(&self) -> &ProgramPool;

    fn tags_of(&self, handle: Handle) -> VmResult<&BoundTagSystem>;

    /// Resolves `name`/`arity` called on `receiver` (the value under
    /// inspection at the call site, which may be an object handle or a
    /// primitive such as a string or number) to something the engine can
    /// run: either a scripted program to enter, or a value the host already
    /// computed natively.
    fn resolve_call(
        &mut self,
        receiver: &Variable,
        name: &str,
        args: &[Variable],
    ) -> VmResult<CallTarget>;
}
