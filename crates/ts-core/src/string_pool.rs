//! Shared string interning pool.
//!
//! Runtime strings are reference-counted so that copying a [`Variable`](crate::Variable)
//! never copies string bytes and so that `==` between two strings that came
//! from the same pool entry is a pointer comparison before falling back to a
//! byte comparison. Program-literal strings are interned once at parse time;
//! strings produced by concatenation at runtime are interned again through
//! the same pool to avoid quadratic growth when the same text is rebuilt
//! repeatedly in a loop.

use hashbrown::HashSet;
use std::rc::Rc;

/// A pool of interned, reference-counted strings.
#[derive(Default)]
pub struct StringPool {
    entries: HashSet<Rc<str>>,
}

impl StringPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning the pool's shared handle. If an equal string
    /// is already interned its existing `Rc` is cloned instead of allocating.
    pub fn intern(&mut self, text: &str) -> Rc<str> {
        if let Some(existing) = self.entries.get(text) {
            return Rc::clone(existing);
        }
        let rc: Rc<str> = Rc::from(text);
        self.entries.insert(Rc::clone(&rc));
        rc
    }

    /// Number of distinct strings currently interned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool currently holds no strings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops interned entries that are only referenced by the pool itself
    /// (`Rc::strong_count == 1`). Not required for correctness — the pool
    /// works fine unbounded — but keeps long-running hosts from retaining
    /// every transient concatenation result forever.
    pub fn collect_unused(&mut self) {
        self.entries.retain(|rc| Rc::strong_count(rc) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_equal_strings() {
        let mut pool = StringPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("hello");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_entries() {
        let mut pool = StringPool::new();
        pool.intern("a");
        pool.intern("b");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn collect_unused_drops_orphaned_entries() {
        let mut pool = StringPool::new();
        {
            let _kept = pool.intern("kept");
            pool.intern("dropped");
            pool.collect_unused();
            // "kept" still referenced by `_kept`, "dropped" is not.
            assert_eq!(pool.len(), 1);
        }
    }
}
