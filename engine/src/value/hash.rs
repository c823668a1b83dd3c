use std::fmt;

use indexmap::IndexMap;

use super::array::vacuum;
use super::{child_path, merge_values, Value};
use crate::path::FieldMatcher;

/// Insertion-ordered map from field name to value.
#[derive(Debug, Clone, Default)]
pub struct Hash {
    fields: IndexMap<String, Value>,
    path: Option<String>,
}

impl Hash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Exact-name lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Insert or overwrite a field, keeping its position if it existed.
    /// `None` is dropped.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Option<Value>>) {
        if let Some(mut value) = value.into() {
            let field = field.into();
            value.set_path(Some(child_path(self.path.as_deref(), &field)));
            self.fields.insert(field, value);
        }
    }

    /// Overwrite a field only if it is already present.
    pub fn replace(&mut self, field: &str, value: impl Into<Option<Value>>) {
        if self.contains_field(field) {
            self.put(field, value);
        }
    }

    /// Merge-append: a second value turns the field into an array.
    pub fn add(&mut self, field: impl Into<String>, value: impl Into<Option<Value>>) {
        let Some(value) = value.into() else {
            return;
        };
        let field = field.into();

        match self.fields.get_mut(&field) {
            Some(existing) => existing.as_list_mut().add(value),
            None => self.put(field, value),
        }
    }

    /// Remove a field by exact name.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, Value> {
        self.fields.iter_mut()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, String, Value> {
        self.fields.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, String, Value> {
        self.fields.values()
    }

    pub fn values_mut(&mut self) -> indexmap::map::ValuesMut<'_, String, Value> {
        self.fields.values_mut()
    }

    /// Names of all fields matching `pattern`, in field order.
    pub fn matching_fields(&self, pattern: &str, matcher: &FieldMatcher) -> Vec<String> {
        if !FieldMatcher::is_pattern(pattern) {
            return if self.contains_field(pattern) {
                vec![pattern.to_string()]
            } else {
                Vec::new()
            };
        }

        self.fields
            .keys()
            .filter(|key| matcher.matches(pattern, key))
            .cloned()
            .collect()
    }

    /// Values of all fields matching `pattern`, merged.
    pub fn get_matching(&self, pattern: &str, matcher: &FieldMatcher) -> Option<Value> {
        let values = self
            .matching_fields(pattern, matcher)
            .iter()
            .filter_map(|field| self.get(field).cloned())
            .collect();
        merge_values(values)
    }

    /// Remove all fields matching `pattern`.
    pub fn remove_matching(&mut self, pattern: &str, matcher: &FieldMatcher) {
        for field in self.matching_fields(pattern, matcher) {
            self.remove(&field);
        }
    }

    /// Keep only fields matching one of `keep`.
    pub fn retain_fields<S: AsRef<str>>(&mut self, keep: &[S], matcher: &FieldMatcher) {
        self.fields
            .retain(|field, _| keep.iter().any(|k| matcher.matches(k.as_ref(), field)));
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: Option<String>) {
        self.path = path;
        let parent = self.path.as_deref();
        for (field, value) in self.fields.iter_mut() {
            value.set_path(Some(child_path(parent, field)));
        }
    }

    /// Drop empty strings recursively, then any container the cleanup left
    /// empty.
    pub fn remove_empty_values(&mut self) {
        self.fields.retain(|_, value| vacuum(value));
    }
}

impl PartialEq for Hash {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl FromIterator<(String, Value)> for Hash {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut hash = Hash::new();
        for (field, value) in iter {
            hash.put(field, value);
        }
        hash
    }
}

impl IntoIterator for Hash {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Hash {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", field, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(pairs: &[(&str, &str)]) -> Hash {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_put_none_is_noop() {
        let mut hash = Hash::new();
        hash.put("a", None);
        assert!(hash.is_empty());
        hash.add("a", None);
        assert!(hash.is_empty());
    }

    #[test]
    fn test_put_keeps_field_position() {
        let mut hash = hash_of(&[("a", "1"), ("b", "2"), ("c", "3")]);
        hash.put("b", Value::from("x"));

        let keys: Vec<_> = hash.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(hash.get("b").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_replace_only_if_present() {
        let mut hash = hash_of(&[("a", "1")]);
        hash.replace("b", Value::from("2"));
        assert!(!hash.contains_field("b"));

        hash.replace("a", Value::from("x"));
        assert_eq!(hash.get("a").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_add_merges_repeated_values_in_order() {
        let mut hash = Hash::new();
        hash.add("name", Value::from("a"));
        assert!(hash.get("name").unwrap().is_string());

        hash.add("name", Value::from("b"));
        hash.add("name", Value::from("c"));

        let expected = Value::from(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(hash.get("name"), Some(&expected));
        assert_eq!(
            hash.get("name").unwrap().as_array().unwrap().get(2).unwrap().path(),
            Some("name.3")
        );
    }

    #[test]
    fn test_add_to_existing_array_appends() {
        let mut hash = Hash::new();
        hash.put("name", Value::from(vec![Value::from("a")]));
        hash.add("name", Value::from("b"));
        assert_eq!(hash.get("name").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_glob_matching() {
        let matcher = FieldMatcher::new();
        let hash = hash_of(&[("name", "A"), ("nome", "B"), ("other", "C")]);

        assert_eq!(hash.matching_fields("n?me", &matcher), vec!["name", "nome"]);
        assert_eq!(hash.matching_fields("n[ao]me", &matcher), vec!["name", "nome"]);
        assert_eq!(hash.matching_fields("name|other", &matcher), vec!["name", "other"]);
        assert_eq!(hash.matching_fields("missing", &matcher), Vec::<String>::new());

        assert_eq!(
            hash.get_matching("n*", &matcher),
            Some(Value::from(vec![Value::from("A"), Value::from("B")]))
        );
        assert_eq!(hash.get_matching("name", &matcher), Some(Value::from("A")));
    }

    #[test]
    fn test_remove_and_retain_matching() {
        let matcher = FieldMatcher::new();
        let mut hash = hash_of(&[("name", "A"), ("nome", "B"), ("other", "C")]);
        hash.remove_matching("n?me", &matcher);
        assert_eq!(hash.keys().cloned().collect::<Vec<_>>(), vec!["other"]);

        let mut hash = hash_of(&[("name", "A"), ("nome", "B"), ("other", "C")]);
        hash.retain_fields(&["n*"], &matcher);
        assert_eq!(hash.keys().cloned().collect::<Vec<_>>(), vec!["name", "nome"]);
    }

    #[test]
    fn test_remove_empty_values() {
        let mut hash = hash_of(&[("a", ""), ("b", "x")]);
        let mut nested = Hash::new();
        nested.put("c", Value::from(""));
        hash.put("nested", Value::from(nested));
        hash.put("list", Value::from(vec![Value::from(""), Value::from("y")]));
        hash.put("kept", Value::from(Hash::new()));

        hash.remove_empty_values();

        let keys: Vec<_> = hash.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "list", "kept"]);
        assert_eq!(hash.get("list"), Some(&Value::from(vec![Value::from("y")])));
    }

    #[test]
    fn test_display() {
        let hash = hash_of(&[("a", "1"), ("b", "2")]);
        assert_eq!(hash.to_string(), "{a=1, b=2}");
    }
}
