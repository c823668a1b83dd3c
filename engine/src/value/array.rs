use std::fmt;

use super::{child_path, Value};

/// Ordered list of values. Duplicates allowed.
#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Vec<Value>,
    path: Option<String>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.items.get_mut(index)
    }

    pub fn last_mut(&mut self) -> Option<&mut Value> {
        self.items.last_mut()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        self.items.iter_mut()
    }

    /// Append a value; `None` is dropped.
    pub fn add(&mut self, value: impl Into<Option<Value>>) {
        if let Some(mut value) = value.into() {
            let index = (self.items.len() + 1).to_string();
            value.set_path(Some(child_path(self.path.as_deref(), &index)));
            self.items.push(value);
        }
    }

    /// Replace the element at `index`; out of range is a no-op.
    pub fn set(&mut self, index: usize, mut value: Value) {
        if index < self.items.len() {
            value.set_path(Some(child_path(
                self.path.as_deref(),
                &(index + 1).to_string(),
            )));
            self.items[index] = value;
        }
    }

    /// Remove the element at `index`; out of range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Value> {
        if index < self.items.len() {
            let removed = self.items.remove(index);
            self.reindex();
            Some(removed)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn retain(&mut self, keep: impl FnMut(&Value) -> bool) {
        self.items.retain(keep);
        self.reindex();
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub(crate) fn set_path(&mut self, path: Option<String>) {
        self.path = path;
        self.reindex();
    }

    /// Recompute element paths after the positions changed.
    pub(crate) fn reindex(&mut self) {
        let parent = self.path.as_deref();
        for (i, item) in self.items.iter_mut().enumerate() {
            item.set_path(Some(child_path(parent, &(i + 1).to_string())));
        }
    }

    /// Drop empty strings recursively, then any container the cleanup left
    /// empty.
    pub(crate) fn remove_empty_values(&mut self) {
        self.items.retain_mut(|item| vacuum(item));
        self.reindex();
    }
}

/// Returns false if the value should be dropped by a vacuum pass.
pub(crate) fn vacuum(value: &mut Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => {
            if a.is_empty() {
                return true;
            }
            a.remove_empty_values();
            !a.is_empty()
        }
        Value::Hash(h) => {
            if h.is_empty() {
                return true;
            }
            h.remove_empty_values();
            !h.is_empty()
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut array = Array::new();
        for value in iter {
            array.add(value);
        }
        array
    }
}

impl IntoIterator for Array {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_none_is_noop() {
        let mut array = Array::new();
        array.add(None);
        assert!(array.is_empty());

        array.add(Value::from("a"));
        array.add(None);
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_element_paths_follow_position() {
        let mut array = Array::new();
        array.set_path(Some("name".into()));
        array.add(Value::from("a"));
        array.add(Value::from("b"));
        array.add(Value::from("c"));

        assert_eq!(array.get(1).unwrap().path(), Some("name.2"));

        array.remove(0);
        assert_eq!(array.get(0).unwrap().path(), Some("name.1"));
        assert_eq!(array.get(1).unwrap().path(), Some("name.2"));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut array: Array = vec![Value::from("a")].into_iter().collect();
        assert!(array.remove(5).is_none());
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_display() {
        let array: Array = vec![Value::from("a"), Value::from("b")].into_iter().collect();
        assert_eq!(array.to_string(), "[a, b]");
    }
}
