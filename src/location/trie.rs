//! Trie keyed on normalized-name characters, for prefix search over the
//! location catalogue. Each node carries the (deduplicated) set of
//! locations reachable through it, so a prefix lookup is a single
//! tree-descent plus a clone of the node's location list.

use super::model::Location;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    locations: Vec<Arc<Location>>,
    seen: std::collections::HashSet<usize>,
    is_end_of_word: bool,
}

#[derive(Default)]
pub struct LocationTrie {
    root: TrieNode,
}

impl LocationTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `location` under `word` (its normalized name). Safe to call
    /// more than once with the same `(word, location)` pair; deduplicated
    /// by pointer identity per node.
    pub fn insert(&mut self, word: &str, location: Arc<Location>) {
        if word.is_empty() {
            return;
        }
        let id = Arc::as_ptr(&location) as usize;
        let mut node = &mut self.root;
        for ch in word.chars() {
            node = node.children.entry(ch).or_default();
            if node.seen.insert(id) {
                node.locations.push(Arc::clone(&location));
            }
        }
        node.is_end_of_word = true;
    }

    /// All locations whose normalized name starts with `prefix`.
    pub fn search_prefix(&self, prefix: &str) -> Vec<Arc<Location>> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut node = &self.root;
        for ch in prefix.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        node.locations.clone()
    }

    /// Locations whose normalized name is exactly `word`.
    pub fn search_exact(&self, word: &str) -> Vec<Arc<Location>> {
        if word.is_empty() {
            return Vec::new();
        }
        let mut node = &self.root;
        for ch in word.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        if node.is_end_of_word {
            node.locations.clone()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(name: &str) -> Arc<Location> {
        Arc::new(Location::new(name, None, None))
    }

    #[test]
    fn prefix_search_finds_inserted_word() {
        let mut trie = LocationTrie::new();
        let tokyo = loc("東京");
        trie.insert("東京", Arc::clone(&tokyo));

        let hits = trie.search_prefix("東");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "東京");
    }

    #[test]
    fn prefix_search_unknown_prefix_is_empty() {
        let mut trie = LocationTrie::new();
        trie.insert("東京", loc("東京"));
        assert!(trie.search_prefix("大阪").is_empty());
    }

    #[test]
    fn exact_search_requires_full_word() {
        let mut trie = LocationTrie::new();
        trie.insert("東京", loc("東京"));
        assert!(trie.search_exact("東").is_empty());
        assert_eq!(trie.search_exact("東京").len(), 1);
    }

    #[test]
    fn insert_is_idempotent_for_same_location() {
        let mut trie = LocationTrie::new();
        let tokyo = loc("東京");
        trie.insert("東京", Arc::clone(&tokyo));
        trie.insert("東京", Arc::clone(&tokyo));
        assert_eq!(trie.search_prefix("東").len(), 1);
    }

    #[test]
    fn shared_prefix_returns_both_locations() {
        let mut trie = LocationTrie::new();
        trie.insert("東京", loc("東京"));
        trie.insert("東京都庁", loc("東京都庁"));
        assert_eq!(trie.search_prefix("東京").len(), 2);
    }
}
