//! Scoped name resolution (§4.3). A [`Scope`] is a flat list of bindings
//! plus an optional parent; lookup walks up the chain, declaration is always
//! local to the innermost scope.

use crate::error::{CompileError, CompileResult};

/// How a name resolves to a value at code-generation time.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    /// A function-local or parameter slot, addressed as a `bp`-relative
    /// stack offset (negative for parameters, non-negative for locals).
    Local { offset: i64 },
    /// A field on the enclosing object's own heap.
    Field { address: usize },
    /// A system object with a handle known at compile time (e.g. `Console`);
    /// `None` until the object manager assigns one, at which point emission
    /// falls back to a runtime lookup of `name` as a child of root.
    Static { handle: Option<u32>, name: String },
    /// A `using a.b.c;` import: the dotted accessor chain rooted at `Plugin`.
    Plugin { path: Vec<String> },
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    kind: SymbolKind,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: Vec<Binding>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` in this scope, shadowing any outer binding of the
    /// same name. Declaration is always local — this never touches a parent.
    pub fn declare(&mut self, name: &str, kind: SymbolKind) {
        self.bindings.push(Binding { name: name.to_string(), kind });
    }

    fn find(&self, name: &str) -> Option<&SymbolKind> {
        self.bindings.iter().rev().find(|b| b.name == name).map(|b| &b.kind)
    }
}

/// A chain of scopes: function body, enclosing block, object-level fields
/// and statics, in that lookup order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::new()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the outermost scope");
        self.scopes.pop();
    }

    pub fn declare(&mut self, name: &str, kind: SymbolKind) {
        self.scopes.last_mut().expect("at least one scope").declare(name, kind);
    }

    /// Walks from the innermost scope outward, returning the first match.
    pub fn resolve(&self, name: &str) -> Option<&SymbolKind> {
        self.scopes.iter().rev().find_map(|scope| scope.find(name))
    }

    pub fn resolve_or_err(&self, file: &str, line: usize, name: &str) -> CompileResult<&SymbolKind> {
        self.resolve(name).ok_or_else(|| CompileError::UnknownSymbol {
            file: file.to_string(),
            line,
            name: name.to_string(),
        })
    }

    /// Validates `name` can be the target of an assignment (§4.3: writing to
    /// a static or plugin-path symbol is rejected, not silently ignored, so
    /// the author finds out rather than getting a no-op store).
    pub fn check_assignable(&self, file: &str, line: usize, name: &str) -> CompileResult<()> {
        match self.resolve_or_err(file, line, name)? {
            SymbolKind::Local { .. } | SymbolKind::Field { .. } => Ok(()),
            SymbolKind::Static { .. } => Err(CompileError::AssignToImmutable {
                file: file.to_string(),
                line,
                name: name.to_string(),
                reason: "static system-object handles are immutable",
            }),
            SymbolKind::Plugin { .. } => Err(CompileError::AssignToImmutable {
                file: file.to_string(),
                line,
                name: name.to_string(),
                reason: "plugin imports are immutable",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        table.declare("x", SymbolKind::Field { address: 0 });
        table.push_scope();
        table.declare("x", SymbolKind::Local { offset: -1 });
        assert_eq!(table.resolve("x"), Some(&SymbolKind::Local { offset: -1 }));
        table.pop_scope();
        assert_eq!(table.resolve("x"), Some(&SymbolKind::Field { address: 0 }));
    }

    #[test]
    fn unresolved_name_is_an_error() {
        let table = SymbolTable::new();
        assert!(matches!(
            table.resolve_or_err("f.ss", 1, "missing"),
            Err(CompileError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn assigning_to_a_static_symbol_is_rejected() {
        let mut table = SymbolTable::new();
        table.declare("Console", SymbolKind::Static { handle: None, name: "Console".into() });
        assert!(matches!(
            table.check_assignable("f.ss", 1, "Console"),
            Err(CompileError::AssignToImmutable { .. })
        ));
    }

    #[test]
    fn assigning_to_a_local_is_allowed() {
        let mut table = SymbolTable::new();
        table.declare("x", SymbolKind::Local { offset: 0 });
        assert!(table.check_assignable("f.ss", 1, "x").is_ok());
    }
}
