//! Glob matching of field names, with a per-session compiled pattern cache.

use dashmap::DashMap;
use regex::Regex;

use super::ARRAY_MARKER;

/// Matches field names against glob patterns (`*`, `?`, `[...]`, `|`).
///
/// Compiled patterns are memoized by pattern string. The cache is owned by
/// the session that creates it and shared between its records through an
/// `Arc`.
#[derive(Debug, Default)]
pub struct FieldMatcher {
    cache: DashMap<String, Option<Regex>>,
}

impl FieldMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `field` uses any glob syntax.
    ///
    /// A trailing repeated-group marker (`name[]`) is a plain name, not a
    /// character class.
    pub fn is_pattern(field: &str) -> bool {
        let field = field.strip_suffix(ARRAY_MARKER).unwrap_or(field);
        field.contains(&['*', '?', '|'][..]) || (field.contains('[') && field.contains(']'))
    }

    /// Test `field` against `pattern`. Plain patterns compare exactly.
    pub fn matches(&self, pattern: &str, field: &str) -> bool {
        if !Self::is_pattern(pattern) {
            return pattern == field;
        }

        if let Some(entry) = self.cache.get(pattern) {
            return match entry.value() {
                Some(regex) => regex.is_match(field),
                None => pattern == field,
            };
        }

        let compiled = Regex::new(&glob_to_regex(pattern)).ok();
        if compiled.is_none() {
            log::warn!("Invalid field pattern '{}', matching literally", pattern);
        }
        let matched = match &compiled {
            Some(regex) => regex.is_match(field),
            None => pattern == field,
        };
        self.cache.insert(pattern.to_string(), compiled);
        matched
    }

    /// Number of distinct patterns compiled so far.
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }
}

/// Translate a glob into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^(?:");
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        if in_class {
            match c {
                ']' => {
                    in_class = false;
                    regex.push(']');
                }
                '\\' => regex.push_str("\\\\"),
                other => regex.push(other),
            }
            continue;
        }

        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '|' => regex.push('|'),
            '[' if chars.peek() == Some(&']') => {
                chars.next();
                regex.push_str(&regex::escape(ARRAY_MARKER));
            }
            '[' => {
                in_class = true;
                regex.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    regex.push('^');
                }
            }
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push_str(")$");
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pattern() {
        assert!(FieldMatcher::is_pattern("n?me"));
        assert!(FieldMatcher::is_pattern("n*"));
        assert!(FieldMatcher::is_pattern("name|nome"));
        assert!(FieldMatcher::is_pattern("n[ao]me"));
        assert!(!FieldMatcher::is_pattern("author[]"));
        assert!(!FieldMatcher::is_pattern("title"));
    }

    #[test]
    fn test_glob_semantics() {
        let matcher = FieldMatcher::new();
        assert!(matcher.matches("n?me", "name"));
        assert!(!matcher.matches("n?me", "naame"));
        assert!(matcher.matches("n*", "nothing"));
        assert!(matcher.matches("n[ao]me", "nome"));
        assert!(!matcher.matches("n[ao]me", "nume"));
        assert!(matcher.matches("name|nome", "nome"));
        assert!(!matcher.matches("name|nome", "names"));
        assert!(matcher.matches("a.b*", "a.bc"));
        assert!(!matcher.matches("a.b*", "axbc"));
    }

    #[test]
    fn test_negated_class() {
        let matcher = FieldMatcher::new();
        assert!(matcher.matches("n[!a]me", "nome"));
        assert!(!matcher.matches("n[!a]me", "name"));
    }

    #[test]
    fn test_pattern_cache() {
        let matcher = FieldMatcher::new();
        matcher.matches("n?me", "name");
        matcher.matches("n?me", "nome");
        matcher.matches("title", "title");
        assert_eq!(matcher.cached_patterns(), 1);
    }
}
