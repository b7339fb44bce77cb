//! Back-reference index shared by all three levels of the database.

use std::collections::HashMap;

/// Maps a key (owner name or address) to positions in an owning `Vec`.
///
/// A position is listed once per record filed under the key, so the same
/// child may appear several times. Removal takes out a single occurrence,
/// keeping that count exact across updates.
#[derive(Debug, Default, Clone)]
pub struct Index {
    entries: HashMap<String, Vec<usize>>,
}

impl Index {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `id` under `key`.
    pub fn insert(&mut self, key: &str, id: usize) {
        self.entries.entry(key.to_string()).or_default().push(id);
    }

    /// Removes one occurrence of `id` under `key`. Returns `false` if there
    /// was none.
    pub fn remove_one(&mut self, key: &str, id: usize) -> bool {
        let Some(ids) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|&i| i == id) else {
            return false;
        };
        ids.remove(pos);
        if ids.is_empty() {
            self.entries.remove(key);
        }
        true
    }

    /// All positions under `key`, duplicates included, in insertion order.
    #[must_use]
    pub fn get(&self, key: &str) -> &[usize] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions under `key` with duplicates dropped, first occurrence kept.
    #[must_use]
    pub fn distinct(&self, key: &str) -> Vec<usize> {
        let mut seen = Vec::new();
        for &id in self.get(key) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}
