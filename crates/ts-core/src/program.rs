//! A compiled program: bytecode (or a native marker) plus its label table and
//! string-literal pool, keyed into the [`ProgramPool`](crate::program_pool::ProgramPool)
//! by the declaring class and function name.

use crate::string_pool::StringPool;
use std::rc::Rc;

/// One bytecode operation: an opcode byte plus two 64-bit operand words.
/// The words are reinterpreted by the VM depending on the opcode — as a
/// signed or unsigned integer, an `f64` via `to_bits`, a boolean, a label id,
/// a string-literal index, or (after call-site speculation rewrites a `CALL`
/// into an `OPTCALL`) a raw `Program` pointer. `ts-core` never interprets
/// these fields; it only stores and relocates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub op: u8,
    pub a: i64,
    pub b: i64,
}

impl Operation {
    pub fn new(op: u8, a: i64, b: i64) -> Self {
        Self { op, a, b }
    }

    pub fn a_as_f64(&self) -> f64 {
        f64::from_bits(self.a as u64)
    }

    pub fn a_as_usize(&self) -> usize {
        self.a as usize
    }

    pub fn b_as_usize(&self) -> usize {
        self.b as usize
    }

    pub fn a_as_bool(&self) -> bool {
        self.a != 0
    }
}

/// Whether a program runs bytecode or dispatches to a host-provided native
/// function. The native function itself is registered by name in the
/// runtime's native-function registry — `ts-core` only remembers that this
/// program is native, since it has no knowledge of the runtime's object
/// manager or call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramBody {
    /// Ordinary bytecode, plus its one-shot label relocation state.
    Scripted {
        operations: Vec<Operation>,
        /// `label id -> instruction index`, populated as the compiler emits
        /// label definitions. Once [`Program::resolve_labels`] runs, every
        /// label-id operand embedded in a jump-like operation has been
        /// rewritten to point directly at its instruction index and this
        /// table is no longer consulted.
        labels: Vec<usize>,
        resolved: bool,
    },
    /// Dispatches to `class.function_name` in the runtime's native registry.
    Native,
}

/// A single compiled function or state.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub arity: usize,
    pub body: ProgramBody,
    literals: Vec<Rc<str>>,
    /// Set the first time this program executes. The pool consults this to
    /// refuse replacing a program that has already run.
    has_run: bool,
}

impl Program {
    /// Creates an empty scripted program of the given arity.
    pub fn new_scripted(arity: usize) -> Self {
        Self {
            arity,
            body: ProgramBody::Scripted {
                operations: Vec::new(),
                labels: Vec::new(),
                resolved: false,
            },
            literals: Vec::new(),
            has_run: false,
        }
    }

    /// Creates a native program marker of the given arity.
    pub fn new_native(arity: usize) -> Self {
        Self {
            arity,
            body: ProgramBody::Native,
            literals: Vec::new(),
            has_run: false,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, ProgramBody::Native)
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    pub fn mark_run(&mut self) {
        self.has_run = true;
    }

    /// Appends `operation`, returning its instruction index.
    pub fn emit(&mut self, operation: Operation) -> usize {
        match &mut self.body {
            ProgramBody::Scripted { operations, .. } => {
                operations.push(operation);
                operations.len() - 1
            }
            ProgramBody::Native => panic!("cannot emit bytecode into a native program"),
        }
    }

    pub fn operations(&self) -> &[Operation] {
        match &self.body {
            ProgramBody::Scripted { operations, .. } => operations,
            ProgramBody::Native => &[],
        }
    }

    pub fn operations_mut(&mut self) -> &mut Vec<Operation> {
        match &mut self.body {
            ProgramBody::Scripted { operations, .. } => operations,
            ProgramBody::Native => panic!("native program has no operations"),
        }
    }

    /// Allocates a fresh label id and reserves its slot in the label table;
    /// the target instruction index is filled in later by [`define_label`](Self::define_label).
    pub fn new_label(&mut self) -> usize {
        match &mut self.body {
            ProgramBody::Scripted { labels, .. } => {
                labels.push(usize::MAX);
                labels.len() - 1
            }
            ProgramBody::Native => panic!("native program has no labels"),
        }
    }

    /// Binds `label` to the next instruction that will be emitted.
    pub fn define_label(&mut self, label: usize) {
        match &mut self.body {
            ProgramBody::Scripted { operations, labels, .. } => {
                labels[label] = operations.len();
            }
            ProgramBody::Native => panic!("native program has no labels"),
        }
    }

    /// Resolves every label-id operand to an absolute instruction index, the
    /// first time it is called. `is_jump_operand_a` tells the relocator which
    /// opcodes carry a label id in operand `a` (`ts-vm` owns that knowledge;
    /// `ts-core` stays opcode-agnostic). Idempotent — later calls are no-ops.
    pub fn resolve_labels(&mut self, is_jump_opcode: impl Fn(u8) -> bool) {
        let (operations, labels, resolved) = match &mut self.body {
            ProgramBody::Scripted { operations, labels, resolved } => (operations, labels, resolved),
            ProgramBody::Native => return,
        };
        if *resolved {
            return;
        }
        for operation in operations.iter_mut() {
            if is_jump_opcode(operation.op) {
                let label_id = operation.a as usize;
                if let Some(target) = labels.get(label_id) {
                    operation.a = *target as i64;
                }
            }
        }
        *resolved = true;
        labels.clear();
    }

    /// Interns `text` into this program's literal table (deduplicated across
    /// calls to this program; still backed by the shared `pool` so equal
    /// literals across programs share one allocation) and returns its index.
    pub fn intern_literal(&mut self, pool: &mut StringPool, text: &str) -> usize {
        if let Some(index) = self.literals.iter().position(|s| s.as_ref() == text) {
            return index;
        }
        let rc = pool.intern(text);
        self.literals.push(rc);
        self.literals.len() - 1
    }

    pub fn literal(&self, index: usize) -> Option<&Rc<str>> {
        self.literals.get(index)
    }

    pub fn literals(&self) -> &[Rc<str>] {
        &self.literals
    }

    /// JSON-ish debug dump: arity, a code array of `"mnemonic a-hex b-hex"`
    /// strings (using `mnemonic_of` supplied by `ts-vm`), and the text
    /// literals. There is no binary bytecode format in scope — this exists
    /// purely for host-side debugging.
    pub fn dump(&self, mnemonic_of: impl Fn(u8) -> &'static str) -> serde_json::Value {
        let code: Vec<String> = self
            .operations()
            .iter()
            .map(|op| format!("{} {:#x} {:#x}", mnemonic_of(op.op), op.a, op.b))
            .collect();
        serde_json::json!({
            "arity": self.arity,
            "native": self.is_native(),
            "code": code,
            "literals": self.literals.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_jmp(op: u8) -> bool {
        op == 0xFF
    }

    #[test]
    fn label_resolution_rewrites_operand_once() {
        let mut program = Program::new_scripted(0);
        let label = program.new_label();
        program.emit(Operation::new(0xFF, label as i64, 0));
        program.emit(Operation::new(0x00, 0, 0));
        program.define_label(label);

        program.resolve_labels(is_jmp);
        assert_eq!(program.operations()[0].a, 1);

        // idempotent: a second call must not touch an already-resolved operand
        program.operations_mut()[0].a = 99;
        program.resolve_labels(is_jmp);
        assert_eq!(program.operations()[0].a, 99);
    }

    #[test]
    fn literal_interning_dedups_within_a_program() {
        let mut pool = StringPool::new();
        let mut program = Program::new_scripted(0);
        let a = program.intern_literal(&mut pool, "hello");
        let b = program.intern_literal(&mut pool, "hello");
        let c = program.intern_literal(&mut pool, "world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(program.literals().len(), 2);
    }

    #[test]
    fn mark_run_is_observable() {
        let mut program = Program::new_scripted(0);
        assert!(!program.has_run());
        program.mark_run();
        assert!(program.has_run());
    }
}
