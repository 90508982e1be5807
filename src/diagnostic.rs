//! Source locations and lenient-parse diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based line/column position. Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Maps byte offsets to line/column locations.
pub struct LineIndex<'a> {
    input: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(input: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(input.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { input, line_starts }
    }

    pub fn location(&self, offset: usize) -> Location {
        let offset = offset.min(self.input.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let column = self
            .input
            .get(start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        Location {
            line: line + 1,
            column: column + 1,
        }
    }
}

/// Something the parser skipped or degraded without failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub location: Location,
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let index = LineIndex::new("Table users {");
        assert_eq!(index.location(0), Location { line: 1, column: 1 });
        assert_eq!(index.location(6), Location { line: 1, column: 7 });
    }

    #[test]
    fn test_later_lines() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.location(2), Location { line: 2, column: 1 });
        assert_eq!(index.location(3), Location { line: 2, column: 2 });
        assert_eq!(index.location(5), Location { line: 3, column: 1 });
        assert_eq!(index.location(6), Location { line: 4, column: 1 });
    }

    #[test]
    fn test_columns_count_chars() {
        let index = LineIndex::new("名前 text");
        assert_eq!(index.location("名前 ".len()), Location { line: 1, column: 4 });
    }

    #[test]
    fn test_offset_past_end_is_clamped() {
        let index = LineIndex::new("ab");
        assert_eq!(index.location(99), Location { line: 1, column: 3 });
    }

    #[test]
    fn test_display() {
        let d = Diagnostic {
            location: Location { line: 3, column: 5 },
            reason: "unrecognized column declaration".into(),
        };
        assert_eq!(d.to_string(), "line 3, column 5: unrecognized column declaration");
    }
}
