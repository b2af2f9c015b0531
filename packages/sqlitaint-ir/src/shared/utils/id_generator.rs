//! Deterministic label and name generation
//!
//! Synthetic loop labels and closure names must be identical across runs,
//! so they come from a per-file counter plus a stable hash of the file path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Per-file generator for synthetic labels and anonymous function names
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    scope: String,
    next_label: usize,
    next_anonymous: usize,
}

impl LabelGenerator {
    /// Create a generator scoped to a file
    pub fn for_file(file_path: &str) -> Self {
        Self {
            scope: scope_hash(file_path),
            next_label: 0,
            next_anonymous: 0,
        }
    }

    /// Next loop label: `compiled_label_<scope>_<n>`
    pub fn next_label(&mut self) -> String {
        let label = format!("compiled_label_{}_{}", self.scope, self.next_label);
        self.next_label += 1;
        label
    }

    /// Next closure name: `{anonymous}#<n>`
    pub fn next_anonymous(&mut self) -> String {
        self.next_anonymous += 1;
        format!("{{anonymous}}#{}", self.next_anonymous)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Short stable hex hash of a string (8 chars)
pub fn scope_hash(input: &str) -> String {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_deterministic() {
        let mut a = LabelGenerator::for_file("src/index.php");
        let mut b = LabelGenerator::for_file("src/index.php");
        assert_eq!(a.next_label(), b.next_label());
        assert_eq!(a.next_label(), b.next_label());
    }

    #[test]
    fn test_labels_unique_within_file() {
        let mut gen = LabelGenerator::for_file("a.php");
        let first = gen.next_label();
        let second = gen.next_label();
        assert_ne!(first, second);
        assert!(first.starts_with("compiled_label_"));
        assert!(first.ends_with("_0"));
    }

    #[test]
    fn test_labels_differ_across_files() {
        let mut a = LabelGenerator::for_file("a.php");
        let mut b = LabelGenerator::for_file("b.php");
        assert_ne!(a.next_label(), b.next_label());
    }

    #[test]
    fn test_anonymous_names() {
        let mut gen = LabelGenerator::for_file("a.php");
        assert_eq!(gen.next_anonymous(), "{anonymous}#1");
        assert_eq!(gen.next_anonymous(), "{anonymous}#2");
    }
}
