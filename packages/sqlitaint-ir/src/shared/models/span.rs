//! Source location types

use serde::{Deserialize, Serialize};

/// Source range of an AST node or IR op
///
/// Lines are 1-based. Byte offsets are inclusive on both ends, so
/// `&source[start_pos..=end_pos]` is the node text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub start_line: u32,
    pub end_line: u32,
    pub start_pos: usize,
    pub end_pos: usize,
}

impl Position {
    pub fn new(start_line: u32, end_line: u32, start_pos: usize, end_pos: usize) -> Self {
        Self {
            start_line,
            end_line,
            start_pos,
            end_pos,
        }
    }

    /// Synthetic position (ops created by the builder with no source node)
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_synthetic(&self) -> bool {
        self.start_line == 0
    }

    /// Text covered by this position, or `""` when out of bounds
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        if self.is_synthetic() || self.end_pos < self.start_pos {
            return "";
        }
        source.get(self.start_pos..=self.end_pos).unwrap_or("")
    }

    /// Bytes covered by this position, or empty when out of bounds
    pub fn slice_bytes<'a>(&self, source: &'a [u8]) -> &'a [u8] {
        if self.is_synthetic() || self.end_pos < self.start_pos {
            return &[];
        }
        source.get(self.start_pos..=self.end_pos).unwrap_or(&[])
    }

    /// Smallest position covering both
    pub fn merge(&self, other: &Position) -> Position {
        if self.is_synthetic() {
            return *other;
        }
        if other.is_synthetic() {
            return *self;
        }
        Position {
            start_line: self.start_line.min(other.start_line),
            end_line: self.end_line.max(other.end_line),
            start_pos: self.start_pos.min(other.start_pos),
            end_pos: self.end_pos.max(other.end_pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_inclusive_end() {
        let src = "<?php $x = 1;";
        let pos = Position::new(1, 1, 6, 7);
        assert_eq!(pos.slice(src), "$x");
    }

    #[test]
    fn test_slice_out_of_bounds_is_empty() {
        let pos = Position::new(1, 1, 10, 400);
        assert_eq!(pos.slice("short"), "");
        assert_eq!(Position::zero().slice("anything"), "");
    }

    #[test]
    fn test_slice_bytes_ignores_encoding() {
        let src = b"<?php $caf\xe9 = 1;";
        assert_eq!(Position::new(1, 1, 6, 10).slice_bytes(src), b"$caf\xe9");
        assert_eq!(Position::new(1, 1, 6, 99).slice_bytes(src), b"");
        assert_eq!(Position::zero().slice_bytes(src), b"");
    }

    #[test]
    fn test_merge_ignores_synthetic() {
        let a = Position::new(2, 2, 10, 12);
        let b = Position::new(3, 4, 20, 40);
        assert_eq!(a.merge(&b), Position::new(2, 4, 10, 40));
        assert_eq!(Position::zero().merge(&a), a);
    }
}
