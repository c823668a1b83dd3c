//! Dotted path addressing.
//!
//! A path such as `author[].$last.name` is split on `.` into segments. Each
//! segment is a field name (optionally a glob), a 1-based index, the `*`
//! wildcard, or one of the reserved markers `$append`, `$first`, `$last`.
//!
//! - [`FixPath`] - Parsed path
//! - [`FieldMatcher`] - Glob matching with a compiled pattern cache
//! - [`PathResolver`] - find / insert / transform / remove over a value tree

mod matcher;
mod resolver;

use std::fmt;

pub use matcher::FieldMatcher;
pub use resolver::{InsertMode, PathResolver};

/// Segment separator.
pub const SEPARATOR: char = '.';

/// "All elements" segment.
pub const WILDCARD: &str = "*";

/// Suffix marking a field whose entity is a list rather than a map.
pub const ARRAY_MARKER: &str = "[]";

/// Reserved positional markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedField {
    Append,
    First,
    Last,
}

impl ReservedField {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "$append" => Some(ReservedField::Append),
            "$first" => Some(ReservedField::First),
            "$last" => Some(ReservedField::Last),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservedField::Append => "$append",
            ReservedField::First => "$first",
            ReservedField::Last => "$last",
        }
    }
}

/// Parse a 1-based index segment.
pub fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixPath {
    segments: Vec<String>,
}

impl FixPath {
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Split `a.b|c.d` into whole alternative paths.
    ///
    /// Alternation inside a single segment (`name|nome`) stays a glob and is
    /// not split here.
    pub fn alternatives(path: &str) -> Vec<FixPath> {
        if path.contains('|') && path.contains(SEPARATOR) {
            path.split('|').map(FixPath::new).collect()
        } else {
            vec![FixPath::new(path)]
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    /// Last segment, if it is a reserved marker.
    pub fn last_reserved(&self) -> Option<ReservedField> {
        self.segments
            .last()
            .and_then(|s| ReservedField::from_segment(s))
    }

    /// This path without its last segment.
    pub fn parent(&self) -> Option<FixPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(FixPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl fmt::Display for FixPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_segments() {
        let path = FixPath::new("author[].$last.name");
        assert_eq!(path.segments(), &["author[]", "$last", "name"]);
        assert!(!path.is_single());
        assert_eq!(path.to_string(), "author[].$last.name");
    }

    #[test]
    fn test_alternatives() {
        let alternatives = FixPath::alternatives("data.name|data.nome");
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[1].segments(), &["data", "nome"]);

        assert_eq!(FixPath::alternatives("name|nome").len(), 1);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("1"), Some(1));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("a1"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn test_reserved_markers() {
        assert_eq!(ReservedField::from_segment("$append"), Some(ReservedField::Append));
        assert_eq!(ReservedField::from_segment("$i"), None);
        assert_eq!(
            FixPath::new("nums[].$append").last_reserved(),
            Some(ReservedField::Append)
        );
        assert_eq!(FixPath::new("nums[].$append").parent().unwrap().to_string(), "nums[]");
    }
}
