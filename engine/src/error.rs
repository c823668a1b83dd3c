//! Error types for the Metafix engine.
//!
//! Errors are layered the same way the engine is:
//!
//! - [`ValueError`] - Value tree and path resolution errors
//! - [`MapError`] - Lookup map errors
//! - [`FixError`] - Fix dispatch and command errors
//! - [`StreamError`] - Event stream folding errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::value::ValueType;

// =============================================================================
// Value Errors
// =============================================================================

/// Structural errors raised by the value tree and the path resolver.
///
/// These are always fatal: they describe a path that does not fit the
/// shape of the record, not a data problem a strictness policy can absorb.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// A value of one type was found where another was required.
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: ValueType },

    /// A reference segment (`$first`, `$last`, numeric) pointed nowhere.
    #[error("Using ref, but can't find: {reference} in: {context}")]
    MissingReference { reference: String, context: String },
}

impl ValueError {
    pub fn type_mismatch(expected: impl Into<String>, actual: ValueType) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual,
        }
    }
}

// =============================================================================
// Map Errors
// =============================================================================

/// Errors from lookup maps.
#[derive(Debug, Error)]
pub enum MapError {
    /// Failed to open or read a map file.
    #[error("Failed to read map file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The map file is not valid CSV.
    #[error("Invalid map file '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Separator option is not a single byte character.
    #[error("Invalid map separator: '{0}'")]
    InvalidSeparator(String),
}

// =============================================================================
// Fix Errors
// =============================================================================

/// Kind of command looked up in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Method,
    Conditional,
    Bind,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Method => write!(f, "method"),
            CommandKind::Conditional => write!(f, "conditional"),
            CommandKind::Bind => write!(f, "bind"),
        }
    }
}

/// Errors raised while dispatching a Fix against a record.
#[derive(Debug, Error)]
pub enum FixError {
    /// Path or value structure error.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// No command registered under this name.
    #[error("Unknown {kind}: {name}")]
    UnknownCommand { kind: CommandKind, name: String },

    /// A command is already registered under this name.
    #[error("{kind} already registered: {name}")]
    AlreadyRegistered { kind: CommandKind, name: String },

    /// A required positional parameter is missing.
    #[error("Missing parameter {index} for '{command}'")]
    MissingParameter { command: String, index: usize },

    /// A required named option is missing.
    #[error("Missing option '{option}' for '{command}'")]
    MissingOption { command: String, option: String },

    /// A `$[name]` placeholder refers to an unknown variable.
    #[error("Variable '{0}' could not be resolved")]
    UnresolvedVariable(String),

    /// A user supplied regular expression does not compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An included fix could not be loaded.
    #[error("Cannot include '{path}': {message}")]
    Include { path: String, message: String },

    /// Lookup map error.
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// A command failed against this particular record's data.
    #[error("Error while executing '{command}': {message}")]
    Execution { command: String, message: String },

    /// Fix JSON could not be parsed.
    #[error("Invalid fix: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixError {
    pub fn execution(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Data-dependent errors are subject to the strictness policy,
    /// everything else aborts processing.
    pub fn is_execution(&self) -> bool {
        matches!(self, FixError::Execution { .. })
    }
}

// =============================================================================
// Stream Errors
// =============================================================================

/// Errors raised while folding or emitting an event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Entity starts and ends do not pair up within a record.
    #[error("Entity starts and ends are not balanced")]
    EntitiesNotBalanced,

    /// An open entity could not be found in the record under construction.
    #[error("Open entity not found: {0}")]
    EntityNotFound(String),

    /// Input that cannot be turned into records.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transformation of the folded record failed.
    #[error("Error while executing the transformation: {0}")]
    Fix(#[from] FixError),

    /// Downstream receiver failed.
    #[error("Receiver error: {0}")]
    Receiver(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::pipeline::transform_json`]
/// and friends. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] crate::parser::CsvError),

    /// Stream error.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Fix error.
    #[error("Fix error: {0}")]
    Fix(#[from] FixError),

    /// Input is not a JSON object or array of objects.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for value and path operations.
pub type ValueResult<T> = Result<T, ValueError>;

/// Result type for lookup map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Result type for fix dispatch.
pub type FixResult<T> = Result<T, FixError>;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ValueError -> FixError -> StreamError -> PipelineError
        let value_err = ValueError::type_mismatch("String", ValueType::Array);
        let fix_err: FixError = value_err.into();
        assert!(!fix_err.is_execution());

        let stream_err: StreamError = fix_err.into();
        let pipeline_err: PipelineError = stream_err.into();
        assert!(pipeline_err.to_string().contains("Expected String, got Array"));
    }

    #[test]
    fn test_type_mismatch_format() {
        let err = ValueError::type_mismatch("Array or Hash", ValueType::String);
        assert_eq!(err.to_string(), "Expected Array or Hash, got String");
    }

    #[test]
    fn test_missing_reference_format() {
        let err = ValueError::MissingReference {
            reference: "$last".into(),
            context: "{}".into(),
        };
        assert_eq!(err.to_string(), "Using ref, but can't find: $last in: {}");
    }

    #[test]
    fn test_execution_classification() {
        assert!(FixError::execution("sum", "invalid digit").is_execution());
        assert!(!FixError::UnknownCommand {
            kind: CommandKind::Method,
            name: "foo".into()
        }
        .is_execution());
        assert!(!FixError::UnresolvedVariable("x".into()).is_execution());
    }

    #[test]
    fn test_entities_not_balanced_message() {
        assert_eq!(
            StreamError::EntitiesNotBalanced.to_string(),
            "Entity starts and ends are not balanced"
        );
    }
}
