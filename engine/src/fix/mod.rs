//! Fix scripts and their execution.
//!
//! A [`Fix`] is a tree of [`Expression`]s loaded from JSON. A
//! [`RecordTransformer`] walks it against one record, resolving command
//! names through a [`FixRegistry`] and session state through an
//! [`Environment`].
//!
//! - [`ast`] - Expression tree and JSON loading
//! - [`registry`] - Name to command tables
//! - [`transformer`] - Dispatch and strictness handling
//! - built-in methods, conditionals and binds

pub mod ast;
mod binds;
mod conditionals;
pub mod environment;
mod methods;
pub mod registry;
pub mod strictness;
pub mod transformer;

pub use ast::{ElsIf, Expression, Fix, Options};
pub use environment::Environment;
pub use registry::{BindFn, ConditionalFn, FixRegistry, MethodFn};
pub use strictness::Strictness;
pub use transformer::RecordTransformer;
