//! Segment-indexed trie over URL paths
//!
//! A path is split into `/`-led segments (`/a/b` becomes `/a`, `/b`). Prefix
//! policies are stored under a trailing `/*` segment so that exact and prefix
//! entries share one structure and one lookup.

use std::collections::HashMap;

use crate::constants::{ROOT_PATH, WILDCARD_SEGMENT};

struct Node<V> {
    children: HashMap<String, Self>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }

    fn is_prunable(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn wildcard_value(&self) -> Option<&V> {
        self.children
            .get(WILDCARD_SEGMENT)
            .and_then(|child| child.value.as_ref())
    }
}

/// Path trie holding one value per path
pub struct PathTrie<V> {
    root: Node<V>,
}

impl<V> std::fmt::Debug for PathTrie<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathTrie")
            .field("top_level_segments", &self.root.children.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PathTrie<V> {
    #[must_use]
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Store `value` at `path`, replacing any previous value.
    ///
    /// Returns `true` when the path held no value before.
    pub fn put(&mut self, path: &str, value: V) -> bool {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node
                .children
                .entry(segment.to_owned())
                .or_insert_with(Node::new);
        }
        node.value.replace(value).is_none()
    }

    /// Exact lookup
    pub fn get(&self, path: &str) -> Option<&V> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.children.get(segment)?;
        }
        node.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut V> {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.get_mut(segment)?;
        }
        node.value.as_mut()
    }

    /// Lookup with optional wildcard fallback.
    ///
    /// While descending, the deepest `/*` entry seen on the way (including one
    /// directly under the target node) is remembered and returned when the
    /// target itself holds no value.
    pub fn get_actions(&self, path: &str, include_parent_fallback: bool) -> Option<&V> {
        if !include_parent_fallback {
            return self.get(path);
        }

        let mut node = &self.root;
        let mut fallback = node.wildcard_value();
        for segment in segments(path) {
            let Some(child) = node.children.get(segment) else {
                return fallback;
            };
            node = child;
            if let Some(value) = node.wildcard_value() {
                fallback = Some(value);
            }
        }
        node.value.as_ref().or(fallback)
    }

    /// Clear the value at `path` and prune nodes left without value or children.
    ///
    /// Returns `false` when no node exists for `path`.
    pub fn delete(&mut self, path: &str) -> bool {
        let segments: Vec<&str> = segments(path).collect();
        Self::delete_at(&mut self.root, &segments)
    }

    fn delete_at(node: &mut Node<V>, segments: &[&str]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            node.value = None;
            return true;
        };
        let Some(child) = node.children.get_mut(*first) else {
            return false;
        };
        if !Self::delete_at(child, rest) {
            return false;
        }
        if child.is_prunable() {
            node.children.remove(*first);
        }
        true
    }

    /// `true` when the trie holds no paths at all
    pub fn is_empty(&self) -> bool {
        self.root.is_prunable()
    }
}

/// Split a path into `/`-led segments; an empty path is the root path.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    let mut rest = if path.is_empty() { ROOT_PATH } else { path };
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .skip(1)
            .find_map(|(i, c)| (c == '/').then_some(i))
            .unwrap_or(rest.len());
        let (segment, tail) = rest.split_at(end);
        rest = tail;
        Some(segment)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases() -> Vec<(&'static str, i32)> {
        vec![
            ("/path", 2),
            ("/path/*", 3),
            ("/path/path1", 4),
            ("/home", 5),
            ("/web", 6),
            ("/web/*", 7),
        ]
    }

    fn populated() -> PathTrie<i32> {
        let mut trie = PathTrie::new();
        for (path, value) in cases() {
            trie.put(path, value);
        }
        trie
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("/a/b").collect::<Vec<_>>(), vec!["/a", "/b"]);
        assert_eq!(segments("/").collect::<Vec<_>>(), vec!["/"]);
        assert_eq!(segments("").collect::<Vec<_>>(), vec!["/"]);
        assert_eq!(segments("/web/*").collect::<Vec<_>>(), vec!["/web", "/*"]);
        assert_eq!(segments("/a/").collect::<Vec<_>>(), vec!["/a", "/"]);
        assert_eq!(segments("/é/ü").collect::<Vec<_>>(), vec!["/é", "/ü"]);
    }

    #[test]
    fn test_put_get_delete_lifecycle() {
        let mut trie = PathTrie::new();
        let mut all = cases();
        all.extend([("/", 0), ("/*", 1)]);

        for (path, _) in &all {
            assert!(trie.get(path).is_none(), "{path} should be missing");
        }
        for (path, _) in &all {
            assert!(trie.put(path, 100), "{path} should be new");
        }
        for (path, value) in &all {
            assert!(!trie.put(path, *value), "{path} should be replaced");
        }
        for (path, value) in &all {
            assert_eq!(trie.get(path), Some(value));
        }
        for (path, _) in &all {
            assert!(trie.delete(path), "{path} should be deleted");
        }
        // pruning removed every node, down to the first segment
        for path in ["/", "/path", "/web", "/home"] {
            assert!(!trie.delete(path), "{path} should have been pruned");
        }
        for (path, _) in &all {
            assert!(trie.get(path).is_none());
        }
        assert!(trie.is_empty());
    }

    #[test]
    fn test_get_actions_with_fallback() {
        let trie = populated();
        assert_eq!(trie.get_actions("/home/user", true), None);
        assert_eq!(trie.get_actions("/path/home", true), Some(&3));
        assert_eq!(trie.get_actions("/web/home", true), Some(&7));
        assert_eq!(trie.get_actions("/web/user/profile", true), Some(&7));
        assert_eq!(trie.get_actions("/path/path1", true), Some(&4));
        assert_eq!(trie.get_actions("/path", true), Some(&2));
    }

    #[test]
    fn test_get_actions_without_fallback() {
        let trie = populated();
        assert_eq!(trie.get_actions("/web/user", false), None);
        assert_eq!(trie.get_actions("/path", false), Some(&2));
        assert_eq!(trie.get_actions("/path/path1", false), Some(&4));
        assert_eq!(trie.get_actions("/path/path2", false), None);
    }

    #[test]
    fn test_deeper_wildcard_wins() {
        let mut trie = PathTrie::new();
        trie.put("/*", 1);
        trie.put("/api/*", 2);
        trie.put("/api/v1/*", 3);
        assert_eq!(trie.get_actions("/other", true), Some(&1));
        assert_eq!(trie.get_actions("/api/v2/items", true), Some(&2));
        assert_eq!(trie.get_actions("/api/v1/items/7", true), Some(&3));
    }

    #[test]
    fn test_prefix_covers_its_own_root() {
        let mut trie = PathTrie::new();
        trie.put("/web/*", 7);
        assert_eq!(trie.get_actions("/web", true), Some(&7));
        assert_eq!(trie.get_actions("/web", false), None);
    }

    #[test]
    fn test_wildcard_without_value_is_not_a_fallback() {
        let mut trie = PathTrie::new();
        trie.put("/web/*/deep", 1);
        assert_eq!(trie.get_actions("/web/other", true), None);
    }

    #[test]
    fn test_empty_path_is_root() {
        let mut trie = PathTrie::new();
        assert!(trie.put("", 9));
        assert_eq!(trie.get("/"), Some(&9));
        assert_eq!(trie.get_actions("", true), Some(&9));
    }

    #[test]
    fn test_delete_keeps_ancestors_with_values() {
        let mut trie = populated();
        assert!(trie.delete("/path/path1"));
        assert_eq!(trie.get("/path"), Some(&2));
        assert_eq!(trie.get("/path/*"), Some(&3));
        assert!(!trie.delete("/path/path1"));
    }

    #[test]
    fn test_delete_prunes_valueless_chain() {
        let mut trie = PathTrie::new();
        trie.put("/a/b/c", 1);
        trie.put("/x", 2);
        assert!(trie.delete("/a/b/c"));
        assert!(!trie.delete("/a"));
        assert!(!trie.delete("/a/b"));
        assert_eq!(trie.get("/x"), Some(&2));
    }

    #[test]
    fn test_delete_internal_node_keeps_children() {
        let mut trie = PathTrie::new();
        trie.put("/a", 1);
        trie.put("/a/b", 2);
        assert!(trie.delete("/a"));
        assert_eq!(trie.get("/a"), None);
        assert_eq!(trie.get("/a/b"), Some(&2));
    }

    #[test]
    fn test_get_mut() {
        let mut trie = populated();
        if let Some(value) = trie.get_mut("/home") {
            *value = 50;
        }
        assert_eq!(trie.get("/home"), Some(&50));
        assert!(trie.get_mut("/missing").is_none());
    }
}
