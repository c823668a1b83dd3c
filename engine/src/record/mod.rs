//! Record - the root map a fix is applied to.
//!
//! A record owns its field tree, a separate set of virtual fields (such as
//! the record id) that are visible to lookups but not emitted, and the
//! reject flag. Path-based access goes through [`PathResolver`] with the
//! session's shared [`FieldMatcher`].

use std::fmt;
use std::sync::Arc;

use crate::error::{ValueError, ValueResult};
use crate::path::{FieldMatcher, FixPath, InsertMode, PathResolver, SEPARATOR};
use crate::value::{merge_values, Hash, Value};

/// Name of the virtual field holding the record id.
pub const ID_FIELD: &str = "_id";

/// Swap `value` into `target`, keeping the origin path of the slot.
fn replace_value(target: &mut Value, mut value: Value) {
    value.set_path(target.path().map(str::to_string));
    *target = value;
}

#[derive(Debug, Clone)]
pub struct Record {
    fields: Hash,
    virtual_fields: Hash,
    reject: bool,
    matcher: Arc<FieldMatcher>,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Create an empty record with its own pattern cache.
    pub fn new() -> Self {
        Self::with_matcher(Arc::new(FieldMatcher::new()))
    }

    /// Create an empty record sharing a session pattern cache.
    pub fn with_matcher(matcher: Arc<FieldMatcher>) -> Self {
        Self {
            fields: Hash::new(),
            virtual_fields: Hash::new(),
            reject: false,
            matcher,
        }
    }

    /// A sub-record over `fields`, sharing this record's pattern cache.
    pub fn scoped(&self, fields: Hash) -> Self {
        Self {
            fields,
            virtual_fields: Hash::new(),
            reject: false,
            matcher: Arc::clone(&self.matcher),
        }
    }

    /// Copy of this record, including virtual fields and the reject flag.
    ///
    /// Values are owned, so the copy is independent of the original.
    pub fn shallow_clone(&self) -> Self {
        self.clone()
    }

    pub fn matcher(&self) -> &Arc<FieldMatcher> {
        &self.matcher
    }

    pub fn fields(&self) -> &Hash {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Hash {
        &mut self.fields
    }

    pub fn into_fields(self) -> Hash {
        self.fields
    }

    pub fn virtual_fields(&self) -> &Hash {
        &self.virtual_fields
    }

    pub fn put_virtual_field(&mut self, field: impl Into<String>, value: impl Into<Option<Value>>) {
        self.virtual_fields.put(field, value);
    }

    pub fn is_rejected(&self) -> bool {
        self.reject
    }

    pub fn set_reject(&mut self, reject: bool) {
        self.reject = reject;
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look up `field`: exact name first, then path resolution, then the
    /// virtual fields for single segment names.
    pub fn get(&self, field: &str) -> ValueResult<Option<Value>> {
        if let Some(value) = self.fields.get(field) {
            return Ok(Some(value.clone()));
        }

        let resolver = PathResolver::new(&self.matcher);
        let mut results = Vec::new();
        for path in FixPath::alternatives(field) {
            results.extend(resolver.find(path.segments(), &self.fields)?);
        }

        match merge_values(results) {
            Some(value) => Ok(Some(value)),
            None if !field.contains(SEPARATOR) => {
                Ok(self.virtual_fields.get_matching(field, &self.matcher))
            }
            None => Ok(None),
        }
    }

    pub fn contains_field(&self, field: &str) -> ValueResult<bool> {
        Ok(self.get(field)?.is_some())
    }

    /// The single slot addressed by `field`, if it has one.
    ///
    /// Only plain field names and positional segments address a slot;
    /// globs and wildcards return `None`.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        if self.fields.contains_field(field) {
            return self.fields.get_mut(field);
        }
        let path = FixPath::new(field);
        PathResolver::new(&self.matcher).find_mut(path.segments(), &mut self.fields)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Put a top level field by exact name.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Option<Value>>) {
        self.fields.put(field, value);
    }

    /// Merge-append a top level field by exact name.
    pub fn add(&mut self, field: impl Into<String>, value: impl Into<Option<Value>>) {
        self.fields.add(field, value);
    }

    /// Write `value` at `field`, replacing what was there.
    pub fn set(&mut self, field: &str, value: impl Into<Option<Value>>) -> ValueResult<()> {
        self.insert(field, InsertMode::Replace, value.into())
    }

    /// Write `value` at `field`, merging with what was there.
    pub fn append(&mut self, field: &str, value: impl Into<Option<Value>>) -> ValueResult<()> {
        self.insert(field, InsertMode::Append, value.into())
    }

    fn insert(&mut self, field: &str, mode: InsertMode, value: Option<Value>) -> ValueResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let path = FixPath::new(field);
        PathResolver::new(&self.matcher).insert(path.segments(), &mut self.fields, mode, value)
    }

    /// Append every element of `values` to `field`.
    pub fn add_all(&mut self, field: &str, values: &Value) -> ValueResult<()> {
        for value in values.as_list().iter() {
            self.append(field, value.clone())?;
        }
        Ok(())
    }

    /// Remove `field`, by exact name if present, else by path.
    pub fn remove(&mut self, field: &str) {
        if self.fields.remove(field).is_some() {
            return;
        }

        let resolver = PathResolver::new(&self.matcher);
        for path in FixPath::alternatives(field) {
            resolver.remove(path.segments(), &mut self.fields);
        }
    }

    /// Remove `field` and return what it held.
    pub fn take(&mut self, field: &str) -> ValueResult<Option<Value>> {
        let value = self.get(field)?;
        if value.is_some() {
            self.remove(field);
        }
        Ok(value)
    }

    /// Copy the value(s) of `from` to `to`, appending element-wise.
    pub fn copy_field(&mut self, from: &str, to: &str) -> ValueResult<()> {
        match self.get(from)? {
            Some(value) => self.add_all(to, &value),
            None => Ok(()),
        }
    }

    /// Keep only the named top level fields.
    ///
    /// Retained virtual fields without a real counterpart become real fields.
    pub fn retain_fields<S: AsRef<str>>(&mut self, keep: &[S]) {
        let keep: Vec<&str> = keep
            .iter()
            .filter_map(|k| k.as_ref().split(SEPARATOR).next())
            .collect();

        self.fields.retain_fields(&keep, &self.matcher);
        self.virtual_fields.retain_fields(&keep, &self.matcher);

        let promoted: Vec<(String, Value)> = self
            .virtual_fields
            .iter()
            .filter(|(field, _)| !self.fields.contains_field(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        for (field, value) in promoted {
            self.fields.put(field, value);
        }
    }

    /// Drop empty strings, and containers left empty by that, everywhere.
    pub fn remove_empty_values(&mut self) {
        self.fields.remove_empty_values();
    }

    // =========================================================================
    // Transformation
    // =========================================================================

    /// Apply `operator` to every string leaf at `field`.
    ///
    /// Leaves mapped to `None` are removed.
    pub fn transform<E, F>(&mut self, field: &str, operator: &mut F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(&str) -> Result<Option<String>, E>,
    {
        let resolver = PathResolver::new(&self.matcher);
        if self.fields.contains_field(field) {
            return resolver.transform(&[field.to_string()], &mut self.fields, operator);
        }
        for path in FixPath::alternatives(field) {
            resolver.transform(path.segments(), &mut self.fields, operator)?;
        }
        Ok(())
    }

    /// Replace the whole value at `field` with `operator(value)`.
    ///
    /// Glob names apply the operator once per matching field. `None`
    /// removes the field.
    pub fn transform_value<E, F>(&mut self, field: &str, mut operator: F) -> Result<(), E>
    where
        E: From<ValueError>,
        F: FnMut(Value) -> Result<Option<Value>, E>,
    {
        let path = FixPath::new(field);

        if path.is_single() || self.fields.contains_field(field) {
            for name in self.fields.matching_fields(field, &self.matcher) {
                let Some(current) = self.fields.get(&name).cloned() else {
                    continue;
                };
                match operator(current)? {
                    Some(value) => self.fields.put(name, value),
                    None => {
                        self.fields.remove(&name);
                    }
                }
            }
            return Ok(());
        }

        let current = PathResolver::new(&self.matcher)
            .find_mut(path.segments(), &mut self.fields)
            .cloned();

        if let Some(current) = current {
            match operator(current)? {
                Some(value) => {
                    if let Some(target) =
                        PathResolver::new(&self.matcher).find_mut(path.segments(), &mut self.fields)
                    {
                        replace_value(target, value);
                    }
                }
                None => self.remove(field),
            }
            return Ok(());
        }

        // Globs and wildcards have no single slot to write back to.
        if let Some(current) = self.get(field)? {
            match operator(current)? {
                Some(value) => self.set(field, value)?,
                None => self.remove(field),
            }
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields)
    }
}
