//! Value tree model.
//!
//! A [`Value`] is exactly one of a string scalar, an ordered [`Array`], or an
//! insertion-ordered [`Hash`]. Null is not a variant: container insertion
//! points take `impl Into<Option<Value>>` and silently drop `None`.
//!
//! Every value carries a best-effort origin path (`author.2.name`) that is
//! kept in sync when the value is attached to a container.

mod array;
mod hash;

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{ValueError, ValueResult};

pub use array::Array;
pub use hash::Hash;

/// Variant tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Array,
    Hash,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "String"),
            ValueType::Array => write!(f, "Array"),
            ValueType::Hash => write!(f, "Hash"),
        }
    }
}

/// Join a parent origin path and a child segment.
pub(crate) fn child_path(parent: Option<&str>, segment: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}.{}", parent, segment),
        _ => segment.to_string(),
    }
}

// =============================================================================
// Scalar
// =============================================================================

/// String scalar with its origin path.
///
/// Equality only looks at the text.
#[derive(Debug, Clone, Default)]
pub struct Scalar {
    text: String,
    path: Option<String>,
}

impl Scalar {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            path: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl Deref for Scalar {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A node of the record tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Scalar),
    Array(Array),
    Hash(Hash),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Hash(_) => ValueType::Hash,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_hash(&self) -> bool {
        matches!(self, Value::Hash(_))
    }

    /// Empty string, empty array or empty hash.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Hash(h) => h.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&Hash> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut Hash> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn expect_str(&self) -> ValueResult<&str> {
        self.as_str()
            .ok_or_else(|| ValueError::type_mismatch("String", self.value_type()))
    }

    pub fn expect_array(&self) -> ValueResult<&Array> {
        self.as_array()
            .ok_or_else(|| ValueError::type_mismatch("Array", self.value_type()))
    }

    pub fn expect_hash(&self) -> ValueResult<&Hash> {
        self.as_hash()
            .ok_or_else(|| ValueError::type_mismatch("Hash", self.value_type()))
    }

    /// View any value as a list: arrays as themselves, anything else as a
    /// singleton.
    pub fn as_list(&self) -> Cow<'_, [Value]> {
        match self {
            Value::Array(a) => Cow::Borrowed(a.as_slice()),
            other => Cow::Owned(vec![other.clone()]),
        }
    }

    /// Coerce this value into an array in place and return it.
    pub fn as_list_mut(&mut self) -> &mut Array {
        if let Value::Array(a) = self {
            return a;
        }

        let path = self.path().map(str::to_string);
        let old = std::mem::replace(self, Value::Array(Array::new()));
        let mut array = Array::new();
        array.set_path(path);
        array.add(old);
        *self = Value::Array(array);
        self.as_list_mut()
    }

    /// Consume the value as a list.
    pub fn into_list(self) -> Array {
        match self {
            Value::Array(a) => a,
            other => {
                let mut array = Array::new();
                array.add(other);
                array
            }
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Value::String(s) => s.path(),
            Value::Array(a) => a.path(),
            Value::Hash(h) => h.path(),
        }
    }

    /// Set the origin path and rebase every descendant on it.
    pub fn set_path(&mut self, path: Option<String>) {
        match self {
            Value::String(s) => s.path = path,
            Value::Array(a) => a.set_path(path),
            Value::Hash(h) => h.set_path(path),
        }
    }

    /// Start a type-matching dispatch over this value.
    pub fn match_type<R>(&self) -> TypeMatcher<'_, R> {
        TypeMatcher {
            value: self,
            expected: Vec::new(),
            result: None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Scalar::new(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Scalar::new(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(Scalar::new(s.as_str()))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Hash> for Value {
    fn from(h: Hash) -> Self {
        Value::Hash(h)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => write!(f, "{}", a),
            Value::Hash(h) => write!(f, "{}", h),
        }
    }
}

/// Merge the results of several field matches.
///
/// A single match is returned bare; several become one array that flattens
/// inner arrays by one level.
pub(crate) fn merge_values(values: Vec<Value>) -> Option<Value> {
    if values.len() <= 1 {
        return values.into_iter().next();
    }

    let mut merged = Array::new();
    for value in values {
        match value {
            Value::Array(inner) => inner.into_iter().for_each(|v| merged.add(v)),
            other => merged.add(other),
        }
    }
    Some(Value::Array(merged))
}

// =============================================================================
// Type matching
// =============================================================================

/// Visitor-style dispatch over the variants of a [`Value`].
///
/// Registering two handlers for the same variant is a programmer error and
/// panics.
///
/// ```rust,ignore
/// let size = value.match_type()
///     .if_array(|a| a.len())
///     .if_hash(|h| h.len())
///     .or_else_throw()?;
/// ```
pub struct TypeMatcher<'a, R> {
    value: &'a Value,
    expected: Vec<ValueType>,
    result: Option<R>,
}

impl<'a, R> TypeMatcher<'a, R> {
    fn expect(&mut self, value_type: ValueType) {
        assert!(
            !self.expected.contains(&value_type),
            "already expecting {}",
            value_type
        );
        self.expected.push(value_type);
    }

    pub fn if_string(mut self, handler: impl FnOnce(&'a str) -> R) -> Self {
        self.expect(ValueType::String);
        if let Value::String(s) = self.value {
            self.result = Some(handler(s.as_str()));
        }
        self
    }

    pub fn if_array(mut self, handler: impl FnOnce(&'a Array) -> R) -> Self {
        self.expect(ValueType::Array);
        if let Value::Array(a) = self.value {
            self.result = Some(handler(a));
        }
        self
    }

    pub fn if_hash(mut self, handler: impl FnOnce(&'a Hash) -> R) -> Self {
        self.expect(ValueType::Hash);
        if let Value::Hash(h) = self.value {
            self.result = Some(handler(h));
        }
        self
    }

    /// Fall back to `handler` when no registered variant matched.
    pub fn or_else(self, handler: impl FnOnce(&'a Value) -> R) -> R {
        match self.result {
            Some(result) => result,
            None => handler(self.value),
        }
    }

    /// Fail with a type mismatch when no registered variant matched.
    pub fn or_else_throw(self) -> ValueResult<R> {
        match self.result {
            Some(result) => Ok(result),
            None => {
                let expected = self
                    .expected
                    .iter()
                    .map(ValueType::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                Err(ValueError::type_mismatch(expected, self.value.value_type()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_equality_ignores_path() {
        let mut a = Value::from("x");
        a.set_path(Some("a.1".into()));
        let b = Value::from("x");
        assert_eq!(a, b);
        assert_eq!(a.path(), Some("a.1"));
    }

    #[test]
    fn test_as_list_wraps_scalars() {
        let value = Value::from("x");
        assert_eq!(value.as_list().len(), 1);

        let array = Value::from(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(array.as_list().len(), 2);
    }

    #[test]
    fn test_as_list_mut_coerces_in_place() {
        let mut value = Value::from("x");
        value.as_list_mut().add(Value::from("y"));

        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0).unwrap().as_str(), Some("x"));
        assert_eq!(array.get(1).unwrap().as_str(), Some("y"));
    }

    #[test]
    fn test_expect_wrong_variant() {
        let value = Value::from(Hash::new());
        let err = value.expect_str().unwrap_err();
        assert_eq!(err.to_string(), "Expected String, got Hash");
    }

    #[test]
    fn test_match_type_dispatch() {
        let value = Value::from(vec![Value::from("a"), Value::from("b")]);
        let size = value
            .match_type()
            .if_array(|a| a.len())
            .if_hash(|h| h.len())
            .or_else_throw()
            .unwrap();
        assert_eq!(size, 2);
    }

    #[test]
    fn test_match_type_or_else_throw() {
        let value = Value::from("x");
        let err = value
            .match_type::<usize>()
            .if_array(|a| a.len())
            .if_hash(|h| h.len())
            .or_else_throw()
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected Array or Hash, got String");
    }

    #[test]
    fn test_match_type_or_else() {
        let value = Value::from("abc");
        let len = value.match_type().if_array(|a| a.len()).or_else(|_| 0);
        assert_eq!(len, 0);
    }

    #[test]
    #[should_panic(expected = "already expecting String")]
    fn test_match_type_duplicate_handler_panics() {
        let value = Value::from("x");
        let _ = value
            .match_type()
            .if_string(|_| 1)
            .if_string(|_| 2)
            .or_else(|_| 0);
    }

    #[test]
    fn test_merge_values_flattens_one_level() {
        let merged = merge_values(vec![
            Value::from(vec![Value::from("a"), Value::from("b")]),
            Value::from("c"),
        ])
        .unwrap();
        assert_eq!(
            merged,
            Value::from(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );

        assert_eq!(merge_values(vec![Value::from("x")]), Some(Value::from("x")));
        assert_eq!(merge_values(vec![]), None);
    }
}
