//! Dense state registry.
//!
//! States are registered lazily on first sight and never removed, so the index
//! assigned to a state is stable for the lifetime of the registry. Iteration
//! order is first-seen order.

use std::collections::HashMap;
use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Append-only mapping from keys to dense indices.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateRegistry<K: Eq + Hash> {
    keys: Vec<K>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash> Default for StateRegistry<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> StateRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `key`, registering it if unseen.
    pub fn intern(&mut self, key: &K) -> usize {
        if let Some(&i) = self.index.get(key) {
            return i;
        }
        let i = self.keys.len();
        self.keys.push(key.clone());
        self.index.insert(key.clone(), i);
        i
    }

    /// Interns every key of a sequence, returning the index sequence.
    pub fn intern_all<'a, I>(&mut self, keys: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        keys.into_iter().map(|k| self.intern(k)).collect()
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, index: usize) -> Option<&K> {
        self.keys.get(index)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> {
        self.keys.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order_and_stable_indices() {
        let mut reg = StateRegistry::new();
        let seq = vec!["X", "Y", "X", "Z", "Y"];
        let idx = reg.intern_all(&seq);
        assert_eq!(idx, vec![0, 1, 0, 2, 1]);
        assert_eq!(reg.keys(), &["X", "Y", "Z"]);
        assert_eq!(reg.index_of(&"Z"), Some(2));
        assert_eq!(reg.index_of(&"W"), None);
        assert_eq!(reg.get(1), Some(&"Y"));

        // Re-interning never reassigns
        assert_eq!(reg.intern(&"X"), 0);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_empty_registry() {
        let reg: StateRegistry<String> = StateRegistry::default();
        assert!(reg.is_empty());
        assert_eq!(reg.iter().count(), 0);
    }
}
