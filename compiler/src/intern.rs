// intern.rs — Content-addressed interning for hash-consed arenas
//
// An `Interner<T>` stores each distinct value once and maps it to a dense
// index. Looking up a value that is already present returns the existing
// index, so two structurally equal values always share one handle.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct Interner<T> {
    items: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T> Default for Interner<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> Interner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `value`, inserting it if absent.
    /// The boolean is true when the value was newly inserted.
    pub fn intern(&mut self, value: T) -> (u32, bool) {
        if let Some(&id) = self.index.get(&value) {
            return (id, false);
        }
        let id = self.items.len() as u32;
        self.items.push(value.clone());
        self.index.insert(value, id);
        (id, true)
    }

    pub fn lookup(&self, value: &T) -> Option<u32> {
        self.index.get(value).copied()
    }

    pub fn get(&self, id: u32) -> &T {
        &self.items[id as usize]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.items.iter().enumerate().map(|(i, v)| (i as u32, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_an_index() {
        let mut interner = Interner::new();
        let (a, fresh_a) = interner.intern("mem".to_string());
        let (b, fresh_b) = interner.intern("mem".to_string());
        assert_eq!(a, b);
        assert!(fresh_a);
        assert!(!fresh_b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_values_get_distinct_indices() {
        let mut interner = Interner::new();
        let (a, _) = interner.intern(1u64);
        let (b, _) = interner.intern(2u64);
        assert_ne!(a, b);
        assert_eq!(*interner.get(b), 2);
        assert_eq!(interner.lookup(&1), Some(a));
        assert_eq!(interner.lookup(&3), None);
    }
}
