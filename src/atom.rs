// src/atom.rs

//! String interning for master file names.
//!
//! Every master name is interned exactly once; the resulting `Atom` is a
//! dense index into the table, so equality and ordering on atoms are cheap
//! and consistent across the whole run. Commit file sequences are kept
//! sorted by atom, which is what lets the parent-link matcher advance a
//! single cursor instead of rescanning.

use crate::bloom::Bloom;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle for an interned name. Two atoms are equal iff the names are.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Atom(u32);

impl Atom {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The interning table. One per DAG; owned by [`crate::dag::Dag`].
#[derive(Default)]
pub struct NameTable {
    names: Vec<Arc<str>>,
    index: HashMap<Arc<str>, Atom>,
    blooms: Vec<Bloom>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the canonical atom for it.
    pub fn intern(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.index.get(name) {
            return atom;
        }
        let shared: Arc<str> = Arc::from(name);
        let atom = Atom(self.names.len() as u32);
        self.names.push(Arc::clone(&shared));
        self.blooms.push(Bloom::of_name(name));
        self.index.insert(shared, atom);
        atom
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        &self.names[atom.index()]
    }

    /// The precomputed Bloom fingerprint of this name.
    pub fn bloom(&self, atom: Atom) -> &Bloom {
        &self.blooms[atom.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = NameTable::new();
        let a = table.intern("module/foo.c,v");
        let b = table.intern("module/foo.c,v");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(a), "module/foo.c,v");
    }

    #[test]
    fn test_distinct_names_get_distinct_atoms() {
        let mut table = NameTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        assert_ne!(a, b);
        // Atom order follows first-intern order and never changes.
        assert!(a < b);
        assert_eq!(table.intern("a"), a);
    }

    #[test]
    fn test_bloom_matches_name() {
        let mut table = NameTable::new();
        let a = table.intern("src/main.c,v");
        assert_eq!(*table.bloom(a), Bloom::of_name("src/main.c,v"));
    }
}
