//! Helpers shared by the encoder and decoder implementations

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Returns the depth of a structure opened at `depth`, refusing to go past
/// `max_depth`.
pub(crate) fn enter_structure(depth: usize, max_depth: usize) -> Result<usize> {
    let next = depth + 1;
    if next > max_depth {
        return Err(Error::malformed(format!(
            "nesting depth exceeds the limit of {max_depth}"
        )));
    }
    Ok(next)
}

/// Object entries under construction.
///
/// A repeated key keeps the position of its first occurrence and takes the
/// value of its last one. Lookups go through a key index, so building an
/// object is linear in its size.
pub(crate) struct Entries<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Entries<V> {
    pub(crate) fn new() -> Self {
        Entries {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: String, value: V) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub(crate) fn into_vec(self) -> Vec<(String, V)> {
        self.entries
    }
}
