//! Expression dispatch.
//!
//! [`RecordTransformer`] walks a fix depth first against one record.
//! Execution errors go through the [`Strictness`] policy; every other error
//! aborts the record.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::{Expression, Fix, Options};
use super::environment::Environment;
use super::registry::FixRegistry;
use super::strictness::Strictness;
use crate::error::{FixError, FixResult};
use crate::record::Record;

/// `$[name]` placeholder in params and option values.
static VARIABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\[([^\]]+)\]").expect("valid variable regex"));

pub struct RecordTransformer<'a> {
    registry: &'a FixRegistry,
    env: &'a mut Environment,
    strictness: Strictness,
}

impl<'a> RecordTransformer<'a> {
    pub fn new(registry: &'a FixRegistry, env: &'a mut Environment, strictness: Strictness) -> Self {
        Self {
            registry,
            env,
            strictness,
        }
    }

    pub fn environment(&self) -> &Environment {
        self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        self.env
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Run `fix` against `record`.
    ///
    /// On failure the offending record is logged before the error is
    /// returned.
    pub fn transform(&mut self, fix: &Fix, record: &mut Record) -> FixResult<()> {
        self.process(&fix.expressions, record).map_err(|err| {
            log::info!("Error while processing record: {}", record);
            err
        })
    }

    /// Run `expressions` in order against `record`.
    pub fn process(&mut self, expressions: &[Expression], record: &mut Record) -> FixResult<()> {
        for expression in expressions {
            match self.execute(expression, record) {
                Ok(()) => {}
                Err(err) if err.is_execution() => {
                    if self.strictness != Strictness::Process {
                        log::info!("Error while processing record: {}", record);
                    }
                    self.strictness.handle(err, record)?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn execute(&mut self, expression: &Expression, record: &mut Record) -> FixResult<()> {
        let registry = self.registry;

        match expression {
            Expression::Call {
                name,
                params,
                options,
            } => {
                let method = registry.method(name)?;
                let params = self.resolve_params(params)?;
                let options = self.resolve_options(options)?;
                method(self, record, &params, &options)
            }
            Expression::If {
                name,
                params,
                elements,
                elsif,
                otherwise,
            } => {
                if self.test(name, params, record)? {
                    return self.process(elements, record);
                }
                for branch in elsif {
                    if self.test(&branch.name, &branch.params, record)? {
                        return self.process(&branch.elements, record);
                    }
                }
                match otherwise {
                    Some(elements) => self.process(elements, record),
                    None => Ok(()),
                }
            }
            Expression::Unless {
                name,
                params,
                elements,
            } => {
                if self.test(name, params, record)? {
                    Ok(())
                } else {
                    self.process(elements, record)
                }
            }
            Expression::Do {
                name,
                params,
                options,
                elements,
            } => {
                let bind = registry.bind(name)?;
                let params = self.resolve_params(params)?;
                let options = self.resolve_options(options)?;
                bind(self, record, &params, &options, elements)
            }
        }
    }

    fn test(&self, name: &str, params: &[String], record: &Record) -> FixResult<bool> {
        let conditional = self.registry.conditional(name)?;
        let params = self.resolve_params(params)?;
        conditional(record, &params, &Options::new())
    }

    fn resolve_params(&self, params: &[String]) -> FixResult<Vec<String>> {
        params.iter().map(|p| self.resolve(p)).collect()
    }

    fn resolve_options(&self, options: &Options) -> FixResult<Options> {
        options
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.resolve(v)?)))
            .collect()
    }

    /// Substitute `$[name]` placeholders from the session variables.
    pub fn resolve(&self, text: &str) -> FixResult<String> {
        if !text.contains("$[") {
            return Ok(text.to_string());
        }

        let mut resolved = String::with_capacity(text.len());
        let mut last = 0;
        for captures in VARIABLE_REGEX.captures_iter(text) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = self
                .env
                .var(name.as_str())
                .ok_or_else(|| FixError::UnresolvedVariable(name.as_str().to_string()))?;
            resolved.push_str(&text[last..whole.start()]);
            resolved.push_str(value);
            last = whole.end();
        }
        resolved.push_str(&text[last..]);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use indexmap::IndexMap;

    fn run(fix: &Fix, record: &mut Record, strictness: Strictness) -> FixResult<()> {
        let registry = FixRegistry::new();
        let mut env = Environment::default();
        RecordTransformer::new(&registry, &mut env, strictness).transform(fix, record)
    }

    fn failing_fix() -> Fix {
        Fix::new(vec![
            Expression::call("set_field", ["before", "1"]),
            Expression::call("substring", ["data", "x"]),
            Expression::call("set_field", ["after", "2"]),
        ])
    }

    #[test]
    fn test_variable_substitution() {
        let registry = FixRegistry::new();
        let mut vars = IndexMap::new();
        vars.insert("base".to_string(), "http://example.org".to_string());
        let mut env = Environment::new(vars);
        let transformer = RecordTransformer::new(&registry, &mut env, Strictness::Process);

        assert_eq!(transformer.resolve("$[base]/id").unwrap(), "http://example.org/id");
        assert_eq!(transformer.resolve("plain").unwrap(), "plain");
        assert!(matches!(
            transformer.resolve("$[missing]"),
            Err(FixError::UnresolvedVariable(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_strictness_expression_skips_expression() {
        let mut record = Record::new();
        record.put("data", Value::from("abc"));

        run(&failing_fix(), &mut record, Strictness::Expression).unwrap();
        assert!(!record.is_rejected());
        assert_eq!(record.get("after").unwrap(), Some(Value::from("2")));
    }

    #[test]
    fn test_strictness_record_rejects() {
        let mut record = Record::new();
        record.put("data", Value::from("abc"));

        run(&failing_fix(), &mut record, Strictness::Record).unwrap();
        assert!(record.is_rejected());
    }

    #[test]
    fn test_strictness_process_aborts() {
        let mut record = Record::new();
        record.put("data", Value::from("abc"));

        let err = run(&failing_fix(), &mut record, Strictness::Process).unwrap_err();
        assert!(err.is_execution());
        assert_eq!(record.get("after").unwrap(), None);
    }

    #[test]
    fn test_unknown_method_is_fatal_under_any_strictness() {
        let fix = Fix::new(vec![Expression::call::<&str>("no_such_method", [])]);
        let mut record = Record::new();

        let err = run(&fix, &mut record, Strictness::Expression).unwrap_err();
        assert!(matches!(err, FixError::UnknownCommand { .. }));
    }

    #[test]
    fn test_if_elsif_else() {
        let fix = Fix::new(vec![Expression::when(
            "exists",
            ["a"],
            vec![Expression::call("add_field", ["branch", "if"])],
        )
        .elsif("exists", ["b"], vec![Expression::call("add_field", ["branch", "elsif"])])
        .otherwise(vec![Expression::call("add_field", ["branch", "else"])])]);

        let mut record = Record::new();
        record.put("b", Value::from("x"));
        run(&fix, &mut record, Strictness::Process).unwrap();
        assert_eq!(record.get("branch").unwrap(), Some(Value::from("elsif")));

        let mut record = Record::new();
        run(&fix, &mut record, Strictness::Process).unwrap();
        assert_eq!(record.get("branch").unwrap(), Some(Value::from("else")));
    }

    #[test]
    fn test_unless() {
        let fix = Fix::new(vec![Expression::unless(
            "exists",
            ["a"],
            vec![Expression::call("add_field", ["a", "default"])],
        )]);

        let mut record = Record::new();
        run(&fix, &mut record, Strictness::Process).unwrap();
        assert_eq!(record.get("a").unwrap(), Some(Value::from("default")));
    }
}
