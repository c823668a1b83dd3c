//! Name -> command tables.
//!
//! The registry starts out with every built-in method, conditional and bind.
//! Hosts can add their own commands or remove built-ins before running.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ast::{Expression, Options};
use super::transformer::RecordTransformer;
use super::{binds, conditionals, methods};
use crate::error::{CommandKind, FixError, FixResult};
use crate::record::Record;

/// A method mutates the record (or the session, for script level methods).
pub type MethodFn = Arc<
    dyn Fn(&mut RecordTransformer<'_>, &mut Record, &[String], &Options) -> FixResult<()>
        + Send
        + Sync,
>;

/// A conditional tests the record.
pub type ConditionalFn = Arc<dyn Fn(&Record, &[String], &Options) -> FixResult<bool> + Send + Sync>;

/// A bind runs nested expressions in a narrowed scope.
pub type BindFn = Arc<
    dyn Fn(&mut RecordTransformer<'_>, &mut Record, &[String], &Options, &[Expression]) -> FixResult<()>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub struct FixRegistry {
    methods: HashMap<String, MethodFn>,
    conditionals: HashMap<String, ConditionalFn>,
    binds: HashMap<String, BindFn>,
}

impl Default for FixRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn register<F>(
    table: &mut HashMap<String, F>,
    kind: CommandKind,
    name: &str,
    command: F,
) -> FixResult<()> {
    if table.contains_key(name) {
        return Err(FixError::AlreadyRegistered {
            kind,
            name: name.to_string(),
        });
    }
    table.insert(name.to_string(), command);
    Ok(())
}

fn lookup<'r, F>(table: &'r HashMap<String, F>, kind: CommandKind, name: &str) -> FixResult<&'r F> {
    table.get(name).ok_or_else(|| FixError::UnknownCommand {
        kind,
        name: name.to_string(),
    })
}

fn sorted_names<F>(table: &HashMap<String, F>) -> Vec<&str> {
    let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

impl FixRegistry {
    /// Registry with all built-in commands.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        methods::register_all(&mut registry);
        conditionals::register_all(&mut registry);
        binds::register_all(&mut registry);
        registry
    }

    /// Registry without any commands.
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
            conditionals: HashMap::new(),
            binds: HashMap::new(),
        }
    }

    pub fn register_method<F>(&mut self, name: &str, method: F) -> FixResult<()>
    where
        F: Fn(&mut RecordTransformer<'_>, &mut Record, &[String], &Options) -> FixResult<()>
            + Send
            + Sync
            + 'static,
    {
        register(&mut self.methods, CommandKind::Method, name, Arc::new(method) as MethodFn)
    }

    pub fn register_conditional<F>(&mut self, name: &str, conditional: F) -> FixResult<()>
    where
        F: Fn(&Record, &[String], &Options) -> FixResult<bool> + Send + Sync + 'static,
    {
        register(
            &mut self.conditionals,
            CommandKind::Conditional,
            name,
            Arc::new(conditional) as ConditionalFn,
        )
    }

    pub fn register_bind<F>(&mut self, name: &str, bind: F) -> FixResult<()>
    where
        F: Fn(&mut RecordTransformer<'_>, &mut Record, &[String], &Options, &[Expression]) -> FixResult<()>
            + Send
            + Sync
            + 'static,
    {
        register(&mut self.binds, CommandKind::Bind, name, Arc::new(bind) as BindFn)
    }

    pub(super) fn install_method(&mut self, name: &str, method: MethodFn) {
        self.methods.insert(name.to_string(), method);
    }

    pub(super) fn install_conditional(&mut self, name: &str, conditional: ConditionalFn) {
        self.conditionals.insert(name.to_string(), conditional);
    }

    pub(super) fn install_bind(&mut self, name: &str, bind: BindFn) {
        self.binds.insert(name.to_string(), bind);
    }

    pub fn unregister_method(&mut self, name: &str) -> bool {
        self.methods.remove(name).is_some()
    }

    pub fn unregister_conditional(&mut self, name: &str) -> bool {
        self.conditionals.remove(name).is_some()
    }

    pub fn unregister_bind(&mut self, name: &str) -> bool {
        self.binds.remove(name).is_some()
    }

    pub fn method(&self, name: &str) -> FixResult<&MethodFn> {
        lookup(&self.methods, CommandKind::Method, name)
    }

    pub fn conditional(&self, name: &str) -> FixResult<&ConditionalFn> {
        lookup(&self.conditionals, CommandKind::Conditional, name)
    }

    pub fn bind(&self, name: &str) -> FixResult<&BindFn> {
        lookup(&self.binds, CommandKind::Bind, name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        sorted_names(&self.methods)
    }

    pub fn conditional_names(&self) -> Vec<&str> {
        sorted_names(&self.conditionals)
    }

    pub fn bind_names(&self) -> Vec<&str> {
        sorted_names(&self.binds)
    }
}

impl fmt::Debug for FixRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixRegistry")
            .field("methods", &self.methods.len())
            .field("conditionals", &self.conditionals.len())
            .field("binds", &self.binds.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = FixRegistry::new();
        assert!(registry.method("set_field").is_ok());
        assert!(registry.conditional("any_match").is_ok());
        assert!(registry.bind("list").is_ok());
        assert!(registry.method_names().contains(&"upcase"));
    }

    #[test]
    fn test_unknown_command() {
        let registry = FixRegistry::new();
        let err = registry.method("no_such_method").err().unwrap();
        assert_eq!(err.to_string(), "Unknown method: no_such_method");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = FixRegistry::new();
        let err = registry
            .register_conditional("exists", |_, _, _| Ok(true))
            .unwrap_err();
        assert!(matches!(err, FixError::AlreadyRegistered { .. }));

        assert!(registry.unregister_conditional("exists"));
        registry.register_conditional("exists", |_, _, _| Ok(true)).unwrap();
    }

    #[test]
    fn test_custom_method() {
        let mut registry = FixRegistry::empty();
        registry
            .register_method("stamp", |_, record, params, _| {
                record.put(params[0].clone(), crate::value::Value::from("stamped"));
                Ok(())
            })
            .unwrap();
        assert_eq!(registry.method_names(), vec!["stamp"]);
    }
}
