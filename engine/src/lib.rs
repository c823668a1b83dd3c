//! # Metafix - path-addressed record transformation
//!
//! Metafix folds a flat event stream into nested records, runs a fix (a tree
//! of method calls, conditionals and binds) against each record, and emits
//! the result as events again.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ JSON / CSV  │────▶│   Decoder   │────▶│   Metafix   │────▶│  Receiver   │
//! │   records   │     │  (events)   │     │ (fold + fix)│     │ (JSON/events)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use metafix::{transform_json, Expression, Fix, FixScript, TransformOptions};
//!
//! let fix = Fix::new(vec![Expression::call("move_field", ["author", "creator.name"])]);
//! let input = serde_json::json!({"author": "Joyce"});
//! let result = transform_json(&input, &FixScript::new(fix), &TransformOptions::default())?;
//! println!("{}", result.records[0]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`value`] - Value tree (strings, arrays, hashes)
//! - [`path`] - Path syntax, field matching and resolution
//! - [`record`] - Records and record-level operations
//! - [`stream`] - Event stream, stream folding and JSON adapters
//! - [`fix`] - Fix AST, dispatcher and built-in commands
//! - [`maps`] - Lookup maps
//! - [`parser`] - CSV parsing with auto-detection
//! - [`config`] - Transformation options
//! - [`pipeline`] - High-level transform functions

// Core modules
pub mod error;
pub mod value;
pub mod path;
pub mod record;

// Fix interpreter
pub mod fix;
pub mod maps;

// Streaming
pub mod stream;

// Input and orchestration
pub mod parser;
pub mod config;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    FixError, FixResult, MapError, MapResult, PipelineError, StreamError, StreamResult, ValueError,
    ValueResult,
};

// =============================================================================
// Re-exports - Values and records
// =============================================================================

pub use value::{Array, Hash, Value, ValueType};
pub use path::{FieldMatcher, FixPath, PathResolver};
pub use record::Record;

// =============================================================================
// Re-exports - Fix
// =============================================================================

pub use fix::{Expression, Fix, FixRegistry, Options, RecordTransformer, Strictness};
pub use maps::{FileMap, LookupMap, MapRegistry};

// =============================================================================
// Re-exports - Streams
// =============================================================================

pub use stream::{Event, EventCollector, JsonDecoder, JsonEncoder, Metafix, StreamReceiver};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    parse_str, CsvError, ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::TransformOptions;
pub use pipeline::{
    collect_events, transform_bytes, transform_csv, transform_json, CsvInfo, FixScript,
    PipelineResult,
};
