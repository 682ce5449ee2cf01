//! Maps `(class, function, arity)` to a compiled [`Program`]; locked after
//! the perfect-hash seed has been computed over its class names.

use crate::error::{CoreError, CoreResult};
use crate::program::Program;
use hashbrown::{HashMap, HashSet};
use std::cell::RefCell;
use std::rc::Rc;

type Key = (String, String, usize);

/// The shared, read-mostly table of every compiled function and state.
#[derive(Default)]
pub struct ProgramPool {
    programs: HashMap<Key, Rc<RefCell<Program>>>,
    classes: HashSet<String>,
    /// Set once class ids have been assigned; after this no new class may be
    /// introduced, though existing programs may still gain *new* functions
    /// (a class is never fully "closed" to new arities, only to replacement
    /// of a program that has already executed).
    frozen: bool,
}

impl ProgramPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Locks the pool against the introduction of classes not already
    /// present. Called once by the object manager after perfect-hash
    /// seeding (§4.7).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Registers `program` under `(class, function, arity)`. Fails if a
    /// program already occupies that key and has executed at least once, or
    /// if the pool is frozen and `class` was never seen before freezing.
    pub fn register(
        &mut self,
        class: &str,
        function: &str,
        arity: usize,
        program: Program,
    ) -> CoreResult<()> {
        if self.frozen && !self.classes.contains(class) {
            return Err(CoreError::PoolState {
                reason: "cannot introduce a new class after the pool has been frozen",
            });
        }

        let key: Key = (class.to_string(), function.to_string(), arity);
        if let Some(existing) = self.programs.get(&key) {
            if existing.borrow().has_run() {
                return Err(CoreError::ProgramFrozen {
                    class: class.to_string(),
                    function: function.to_string(),
                    arity,
                });
            }
        }

        self.classes.insert(class.to_string());
        self.programs.insert(key, Rc::new(RefCell::new(program)));
        Ok(())
    }

    /// Looks up the program for `class.function/arity`.
    pub fn get(&self, class: &str, function: &str, arity: usize) -> CoreResult<Rc<RefCell<Program>>> {
        let key: Key = (class.to_string(), function.to_string(), arity);
        self.programs
            .get(&key)
            .cloned()
            .ok_or_else(|| CoreError::MissingFunction {
                class: class.to_string(),
                function: function.to_string(),
                arity,
            })
    }

    /// Whether `class` has ever registered a program (used to decide whether
    /// a class name is "known" before the perfect-hash seed is computed).
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// All distinct class names that have registered at least one program,
    /// in an arbitrary but stable-for-this-pool order. Consumed by the
    /// perfect-hash seeder at boot.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get_round_trips() {
        let mut pool = ProgramPool::new();
        pool.register("A", "state:main", 0, Program::new_scripted(0)).unwrap();
        assert!(pool.get("A", "state:main", 0).is_ok());
        assert!(pool.get("A", "missing", 0).is_err());
    }

    #[test]
    fn replacing_a_program_that_has_run_is_rejected() {
        let mut pool = ProgramPool::new();
        pool.register("A", "f", 0, Program::new_scripted(0)).unwrap();
        pool.get("A", "f", 0).unwrap().borrow_mut().mark_run();
        let err = pool.register("A", "f", 0, Program::new_scripted(0));
        assert!(matches!(err, Err(CoreError::ProgramFrozen { .. })));
    }

    #[test]
    fn replacing_a_program_that_has_not_run_is_allowed() {
        let mut pool = ProgramPool::new();
        pool.register("A", "f", 0, Program::new_scripted(0)).unwrap();
        assert!(pool.register("A", "f", 0, Program::new_scripted(1)).is_ok());
    }

    #[test]
    fn freezing_rejects_new_classes_but_allows_known_ones() {
        let mut pool = ProgramPool::new();
        pool.register("A", "f", 0, Program::new_scripted(0)).unwrap();
        pool.freeze();
        assert!(pool.register("A", "g", 0, Program::new_scripted(0)).is_ok());
        assert!(matches!(
            pool.register("B", "f", 0, Program::new_scripted(0)),
            Err(CoreError::PoolState { .. })
        ));
    }

    #[test]
    fn class_names_are_deduplicated() {
        let mut pool = ProgramPool::new();
        pool.register("A", "f", 0, Program::new_scripted(0)).unwrap();
        pool.register("A", "g", 0, Program::new_scripted(0)).unwrap();
        pool.register("B", "f", 0, Program::new_scripted(0)).unwrap();
        assert_eq!(pool.class_names(), vec!["A", "B"]);
    }
}
