//! Recursive find / insert / transform / remove over a value tree.
//!
//! Every operation peels one segment off the path and dispatches on the
//! container it is looking at. Out-of-range indices, positional references
//! into empty lists, and wildcard inserts are silent no-ops.

use super::{parse_index, FieldMatcher, ReservedField, WILDCARD};
use crate::error::{ValueError, ValueResult};
use crate::value::{merge_values, Array, Hash, Value, ValueType};

/// How a value is written into its final map field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Overwrite the field.
    Replace,
    /// Merge with an existing value, turning it into an array.
    Append,
}

impl InsertMode {
    pub fn apply(self, hash: &mut Hash, field: &str, value: Value) {
        match self {
            InsertMode::Replace => hash.put(field, value),
            InsertMode::Append => hash.add(field, value),
        }
    }
}

/// Field name a positional marker refers to inside a map.
fn hash_reference(reserved: ReservedField, hash: &Hash) -> String {
    match reserved {
        ReservedField::Last => hash.len().to_string(),
        ReservedField::First | ReservedField::Append => "1".to_string(),
    }
}

/// Collect fan-out results into an array, or nothing if none were found.
fn collect(found: Vec<Value>) -> Option<Value> {
    if found.is_empty() {
        None
    } else {
        Some(Value::Array(found.into_iter().collect()))
    }
}

fn descent_mismatch(actual: ValueType) -> ValueError {
    ValueError::type_mismatch("Array or Hash", actual)
}

fn leaf_mismatch(actual: ValueType) -> ValueError {
    ValueError::type_mismatch("String", actual)
}

/// Path operations bound to a field matcher.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'m> {
    matcher: &'m FieldMatcher,
}

impl<'m> PathResolver<'m> {
    pub fn new(matcher: &'m FieldMatcher) -> Self {
        Self { matcher }
    }

    // =========================================================================
    // find
    // =========================================================================

    /// Look up the value(s) at `path`.
    pub fn find(&self, path: &[String], hash: &Hash) -> ValueResult<Option<Value>> {
        self.find_in_hash(path, hash)
    }

    fn find_in_hash(&self, path: &[String], hash: &Hash) -> ValueResult<Option<Value>> {
        let Some((field, rest)) = path.split_first() else {
            return Ok(Some(Value::Hash(hash.clone())));
        };

        if field == WILDCARD {
            let mut found = Vec::new();
            for value in hash.values() {
                found.extend(self.find_in_value(rest, value)?);
            }
            return Ok(collect(found));
        }

        let field = match ReservedField::from_segment(field) {
            Some(ReservedField::Append) => return Ok(None),
            Some(reserved) => hash_reference(reserved, hash),
            None => field.clone(),
        };

        let mut results = Vec::new();
        for name in hash.matching_fields(&field, self.matcher) {
            let Some(value) = hash.get(&name) else {
                continue;
            };

            if rest.is_empty() {
                results.push(value.clone());
                continue;
            }

            let found = match value {
                Value::Array(a) => self.find_in_array(rest, a)?,
                Value::Hash(h) => self.find_in_hash(rest, h)?,
                Value::String(_) => return Err(descent_mismatch(ValueType::String)),
            };
            results.extend(found);
        }

        Ok(merge_values(results))
    }

    fn find_in_array(&self, path: &[String], array: &Array) -> ValueResult<Option<Value>> {
        let Some((segment, rest)) = path.split_first() else {
            return Ok(Some(Value::Array(array.clone())));
        };

        if segment == WILDCARD {
            let mut found = Vec::new();
            for value in array {
                found.extend(self.find_in_value(rest, value)?);
            }
            return Ok(collect(found));
        }

        let index = match ReservedField::from_segment(segment) {
            Some(ReservedField::Append) => return Ok(None),
            Some(ReservedField::First) => Some(0),
            Some(ReservedField::Last) => array.len().checked_sub(1),
            None => match parse_index(segment) {
                Some(n) => n.checked_sub(1),
                None => {
                    // Distribute the field lookup over a repeated group.
                    let mut found = Vec::new();
                    for value in array {
                        found.extend(self.find_in_value(path, value)?);
                    }
                    return Ok(collect(found));
                }
            },
        };

        match index.and_then(|i| array.get(i)) {
            Some(value) => self.find_in_value(rest, value),
            None => Ok(None),
        }
    }

    fn find_in_value(&self, path: &[String], value: &Value) -> ValueResult<Option<Value>> {
        if path.is_empty() {
            return Ok(Some(value.clone()));
        }

        match value {
            Value::Array(a) => self.find_in_array(path, a),
            Value::Hash(h) => self.find_in_hash(path, h),
            Value::String(_) => Ok(None),
        }
    }

    /// Mutable access to a concrete location.
    ///
    /// Only plain field names and positional segments are followed; globs and
    /// wildcards resolve to nothing.
    pub fn find_mut<'h>(&self, path: &[String], hash: &'h mut Hash) -> Option<&'h mut Value> {
        let (field, rest) = path.split_first()?;
        let value = hash.get_mut(field)?;
        Self::descend_mut(rest, value)
    }

    fn descend_mut<'v>(path: &[String], value: &'v mut Value) -> Option<&'v mut Value> {
        let Some((segment, rest)) = path.split_first() else {
            return Some(value);
        };

        match value {
            Value::Hash(h) => Self::descend_mut(rest, h.get_mut(segment)?),
            Value::Array(a) => {
                let index = match ReservedField::from_segment(segment) {
                    Some(ReservedField::First) => 0,
                    Some(ReservedField::Last) => a.len().checked_sub(1)?,
                    Some(ReservedField::Append) => return None,
                    None => parse_index(segment)?.checked_sub(1)?,
                };
                Self::descend_mut(rest, a.get_mut(index)?)
            }
            Value::String(_) => None,
        }
    }

    // =========================================================================
    // insert
    // =========================================================================

    /// Write `value` at `path`, creating intermediate maps as needed.
    pub fn insert(
        &self,
        path: &[String],
        hash: &mut Hash,
        mode: InsertMode,
        value: Value,
    ) -> ValueResult<()> {
        self.insert_into_hash(path, hash, mode, value)
    }

    fn insert_into_hash(
        &self,
        path: &[String],
        hash: &mut Hash,
        mode: InsertMode,
        value: Value,
    ) -> ValueResult<()> {
        let Some((field, rest)) = path.split_first() else {
            return Ok(());
        };

        if field == WILDCARD {
            return Ok(());
        }

        if rest.is_empty() {
            mode.apply(hash, field, value);
            return Ok(());
        }

        let reserved = ReservedField::from_segment(field);
        if reserved.is_some() || parse_index(field).is_some() {
            let key = match reserved {
                Some(ReservedField::Append) => return self.insert_into_hash(rest, hash, mode, value),
                Some(reserved) => hash_reference(reserved, hash),
                None => field.clone(),
            };

            if !hash.contains_field(&key) {
                return Err(ValueError::MissingReference {
                    reference: field.clone(),
                    context: hash.to_string(),
                });
            }

            return match hash.get_mut(&key) {
                Some(target) => self.insert_into_value(rest, target, mode, value),
                None => Ok(()),
            };
        }

        if !hash.contains_field(field) {
            hash.put(field.clone(), Value::Hash(Hash::new()));
        }

        match hash.get_mut(field) {
            Some(target) => self.insert_into_value(rest, target, mode, value),
            None => Ok(()),
        }
    }

    fn insert_into_value(
        &self,
        path: &[String],
        target: &mut Value,
        mode: InsertMode,
        value: Value,
    ) -> ValueResult<()> {
        match target {
            Value::Hash(h) => self.insert_into_hash(path, h, mode, value),
            Value::Array(a) => self.insert_into_array(path, a, mode, value),
            Value::String(_) => Err(descent_mismatch(ValueType::String)),
        }
    }

    fn insert_into_array(
        &self,
        path: &[String],
        array: &mut Array,
        mode: InsertMode,
        value: Value,
    ) -> ValueResult<()> {
        let Some((segment, rest)) = path.split_first() else {
            return Ok(());
        };

        // Wildcard insertion has no single target.
        if segment == WILDCARD {
            return Ok(());
        }

        match ReservedField::from_segment(segment) {
            Some(ReservedField::Append) => {
                if rest.is_empty() {
                    array.add(value);
                    return Ok(());
                }
                self.insert_into_new_hash(rest, array, mode, value)
            }
            Some(reserved) => {
                if array.is_empty() {
                    return Ok(());
                }
                let index = match reserved {
                    ReservedField::First => 0,
                    _ => array.len() - 1,
                };

                if rest.is_empty() {
                    array.set(index, value);
                    return Ok(());
                }

                match array.get_mut(index) {
                    Some(Value::Hash(h)) => self.insert_into_hash(rest, h, mode, value),
                    _ => Ok(()),
                }
            }
            None => match parse_index(segment) {
                Some(_) if rest.is_empty() => {
                    array.add(value);
                    Ok(())
                }
                Some(n) => {
                    let existing = n
                        .checked_sub(1)
                        .filter(|&i| matches!(array.get(i), Some(Value::Hash(_))));

                    match existing.and_then(|i| array.get_mut(i)) {
                        Some(Value::Hash(h)) => self.insert_into_hash(rest, h, mode, value),
                        _ => self.insert_into_new_hash(rest, array, mode, value),
                    }
                }
                // A field name inside a list starts a new repeated group.
                None => self.insert_into_new_hash(path, array, mode, value),
            },
        }
    }

    fn insert_into_new_hash(
        &self,
        path: &[String],
        array: &mut Array,
        mode: InsertMode,
        value: Value,
    ) -> ValueResult<()> {
        array.add(Value::Hash(Hash::new()));
        match array.last_mut() {
            Some(Value::Hash(h)) => self.insert_into_hash(path, h, mode, value),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // transform
    // =========================================================================

    /// Replace every string leaf at `path` with `operator(leaf)`.
    ///
    /// Leaves for which the operator returns `None` are removed after the
    /// scan of their container, in reverse order.
    pub fn transform<E, F>(&self, path: &[String], hash: &mut Hash, operator: &mut F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(&str) -> Result<Option<String>, E>,
    {
        self.transform_in_hash(path, hash, operator)
    }

    fn transform_in_hash<E, F>(&self, path: &[String], hash: &mut Hash, operator: &mut F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(&str) -> Result<Option<String>, E>,
    {
        let Some((field, rest)) = path.split_first() else {
            return Ok(());
        };

        let fields: Vec<String> = if field == WILDCARD {
            hash.keys().cloned().collect()
        } else {
            match ReservedField::from_segment(field) {
                Some(ReservedField::Append) => return Ok(()),
                Some(reserved) => vec![hash_reference(reserved, hash)],
                None => hash.matching_fields(field, self.matcher),
            }
        };

        let mut removals = Vec::new();
        for name in fields {
            let Some(value) = hash.get_mut(&name) else {
                continue;
            };

            if rest.is_empty() {
                match value {
                    Value::String(s) => match operator(s.as_str())? {
                        Some(text) => s.set_text(text),
                        None => removals.push(name),
                    },
                    Value::Array(a) => self.transform_leaves(a, operator)?,
                    Value::Hash(_) => return Err(leaf_mismatch(ValueType::Hash).into()),
                }
            } else {
                match value {
                    Value::Array(a) => self.transform_in_array(rest, a, operator)?,
                    Value::Hash(h) => self.transform_in_hash(rest, h, operator)?,
                    Value::String(_) => return Err(descent_mismatch(ValueType::String).into()),
                }
            }
        }

        for name in removals.iter().rev() {
            hash.remove(name);
        }
        Ok(())
    }

    fn transform_in_array<E, F>(&self, path: &[String], array: &mut Array, operator: &mut F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(&str) -> Result<Option<String>, E>,
    {
        let Some((segment, rest)) = path.split_first() else {
            return self.transform_leaves(array, operator);
        };

        let (indices, element_path): (Vec<usize>, &[String]) = if segment == WILDCARD {
            ((0..array.len()).collect(), rest)
        } else {
            match ReservedField::from_segment(segment) {
                Some(ReservedField::Append) => return Ok(()),
                Some(ReservedField::First) => ((0..array.len().min(1)).collect(), rest),
                Some(ReservedField::Last) => (array.len().checked_sub(1).into_iter().collect(), rest),
                None => match parse_index(segment) {
                    Some(n) => (
                        n.checked_sub(1).filter(|&i| i < array.len()).into_iter().collect(),
                        rest,
                    ),
                    None => ((0..array.len()).collect(), path),
                },
            }
        };

        let mut removals = Vec::new();
        for index in indices {
            let Some(item) = array.get_mut(index) else {
                continue;
            };

            match item {
                Value::String(s) => {
                    if element_path.is_empty() {
                        match operator(s.as_str())? {
                            Some(text) => s.set_text(text),
                            None => removals.push(index),
                        }
                    }
                }
                Value::Array(a) => self.transform_in_array(element_path, a, operator)?,
                Value::Hash(h) => {
                    if element_path.is_empty() {
                        return Err(leaf_mismatch(ValueType::Hash).into());
                    }
                    self.transform_in_hash(element_path, h, operator)?;
                }
            }
        }

        for index in removals.into_iter().rev() {
            array.remove(index);
        }
        Ok(())
    }

    fn transform_leaves<E, F>(&self, array: &mut Array, operator: &mut F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(&str) -> Result<Option<String>, E>,
    {
        let mut removals = Vec::new();
        for (index, item) in array.iter_mut().enumerate() {
            match item {
                Value::String(s) => match operator(s.as_str())? {
                    Some(text) => s.set_text(text),
                    None => removals.push(index),
                },
                Value::Array(a) => self.transform_leaves(a, operator)?,
                Value::Hash(_) => return Err(leaf_mismatch(ValueType::Hash).into()),
            }
        }

        for index in removals.into_iter().rev() {
            array.remove(index);
        }
        Ok(())
    }

    // =========================================================================
    // remove
    // =========================================================================

    /// Delete the value(s) at `path`.
    pub fn remove(&self, path: &[String], hash: &mut Hash) {
        self.remove_in_hash(path, hash)
    }

    fn remove_in_hash(&self, path: &[String], hash: &mut Hash) {
        let Some((field, rest)) = path.split_first() else {
            return;
        };

        if field == WILDCARD {
            if rest.is_empty() {
                hash.clear();
            } else {
                for value in hash.values_mut() {
                    self.remove_in_value(rest, value);
                }
            }
            return;
        }

        let fields = match ReservedField::from_segment(field) {
            Some(ReservedField::Append) => return,
            Some(reserved) => vec![hash_reference(reserved, hash)],
            None => hash.matching_fields(field, self.matcher),
        };

        for name in fields {
            if rest.is_empty() {
                hash.remove(&name);
            } else if let Some(value) = hash.get_mut(&name) {
                self.remove_in_value(rest, value);
            }
        }
    }

    fn remove_in_array(&self, path: &[String], array: &mut Array) {
        let Some((segment, rest)) = path.split_first() else {
            return;
        };

        if segment == WILDCARD {
            if rest.is_empty() {
                array.clear();
            } else {
                for item in array.iter_mut() {
                    self.remove_in_value(rest, item);
                }
            }
            return;
        }

        let index = match ReservedField::from_segment(segment) {
            Some(ReservedField::Append) => return,
            Some(ReservedField::First) => Some(0),
            Some(ReservedField::Last) => array.len().checked_sub(1),
            None => match parse_index(segment) {
                Some(n) => n.checked_sub(1),
                None => {
                    for item in array.iter_mut() {
                        self.remove_in_value(path, item);
                    }
                    return;
                }
            },
        };

        let Some(index) = index.filter(|&i| i < array.len()) else {
            return;
        };

        if rest.is_empty() {
            array.remove(index);
        } else if let Some(item) = array.get_mut(index) {
            self.remove_in_value(rest, item);
        }
    }

    fn remove_in_value(&self, path: &[String], value: &mut Value) {
        match value {
            Value::Array(a) => self.remove_in_array(path, a),
            Value::Hash(h) => self.remove_in_hash(path, h),
            Value::String(_) => {}
        }
    }
}
