//! Transformation options.
//!
//! Options come from code, a JSON file, or the environment:
//!
//! ```json
//! {
//!   "strictness": "RECORD",
//!   "repeated_fields_to_entities": true,
//!   "entity_member_name": "%d",
//!   "vars": {"base": "http://example.org/"},
//!   "id_field": "id"
//! }
//! ```

use std::env;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::fix::Strictness;

/// Placeholder for the 1-based member index in `entity_member_name`.
pub const INDEX_PLACEHOLDER: &str = "%d";

pub const STRICTNESS_ENV: &str = "METAFIX_STRICTNESS";
pub const REPEATED_FIELDS_ENV: &str = "METAFIX_REPEATED_FIELDS_TO_ENTITIES";
pub const ENTITY_MEMBER_NAME_ENV: &str = "METAFIX_ENTITY_MEMBER_NAME";

/// Options for a transformation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// What to do when a command fails against a record
    pub strictness: Strictness,

    /// Emit every list as an entity with numbered members, not just lists
    /// whose field name ends in `[]`
    pub repeated_fields_to_entities: bool,

    /// Name of entity members; `%d` is replaced by the 1-based index
    pub entity_member_name: String,

    /// Values for `$[name]` placeholders
    pub vars: IndexMap<String, String>,

    /// Input field to take record ids from
    pub id_field: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::Process,
            repeated_fields_to_entities: true,
            entity_member_name: INDEX_PLACEHOLDER.to_string(),
            vars: IndexMap::new(),
            id_field: None,
        }
    }
}

impl TransformOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::default().with_env_overrides()
    }

    /// Apply `METAFIX_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self, PipelineError> {
        if let Ok(value) = env::var(STRICTNESS_ENV) {
            self.strictness = value.parse().map_err(PipelineError::InvalidInput)?;
        }

        if let Ok(value) = env::var(REPEATED_FIELDS_ENV) {
            self.repeated_fields_to_entities = value.trim().parse().map_err(|_| {
                PipelineError::InvalidInput(format!(
                    "{} must be true or false, got '{}'",
                    REPEATED_FIELDS_ENV, value
                ))
            })?;
        }

        if let Ok(value) = env::var(ENTITY_MEMBER_NAME_ENV) {
            self.entity_member_name = value;
        }

        Ok(self)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Name of the list member at `index` (0-based).
    pub fn member_name(&self, index: usize) -> String {
        self.entity_member_name
            .replace(INDEX_PLACEHOLDER, &(index + 1).to_string())
    }
}
