//! Built-in binds.
//!
//! `do list(path: "...", var: "...")` iterates the values at `path`. With a
//! `var` each element is exposed to the nested expressions as an extra
//! field of the current record; without one each element must be a hash
//! and becomes the record for the nested expressions.

use std::sync::Arc;

use super::ast::{Expression, Options};
use super::registry::{BindFn, FixRegistry};
use super::transformer::RecordTransformer;
use crate::error::{FixError, FixResult, ValueError};
use crate::record::Record;
use crate::value::Value;

const PATH_OPTION: &str = "path";
const VAR_OPTION: &str = "var";

pub(super) fn register_all(registry: &mut FixRegistry) {
    registry.install_bind("list", Arc::new(list) as BindFn);
}

fn list(
    tf: &mut RecordTransformer<'_>,
    record: &mut Record,
    _: &[String],
    options: &Options,
    elements: &[Expression],
) -> FixResult<()> {
    let path = options
        .get(PATH_OPTION)
        .ok_or_else(|| FixError::MissingOption {
            command: "list".to_string(),
            option: PATH_OPTION.to_string(),
        })?;

    let Some(value) = record.get(path)? else {
        return Ok(());
    };
    let items = value.into_list().into_vec();

    for (index, item) in items.into_iter().enumerate() {
        let updated = match options.get(VAR_OPTION) {
            Some(var) => {
                // A real field under the var name is shadowed, not lost.
                let shadowed = record.fields().get(var).cloned();
                record.put(var.as_str(), item);
                let result = tf.process(elements, record);
                let bound = match shadowed {
                    Some(previous) => {
                        let bound = record.fields().get(var).cloned();
                        record.put(var.as_str(), previous);
                        bound
                    }
                    None => record.fields_mut().remove(var),
                };
                result?;
                bound
            }
            None => {
                let Value::Hash(fields) = item else {
                    return Err(ValueError::type_mismatch("Hash", item.value_type()).into());
                };
                let mut scope = record.scoped(fields);
                tf.process(elements, &mut scope)?;
                if scope.is_rejected() {
                    record.set_reject(true);
                }
                Some(Value::Hash(scope.into_fields()))
            }
        };

        if let Some(updated) = updated {
            write_back(record, path, index, updated);
        }
    }

    Ok(())
}

/// Store the processed element at its position in the bound list.
fn write_back(record: &mut Record, path: &str, index: usize, mut value: Value) {
    let Some(target) = record.get_mut(path) else {
        return;
    };

    match target {
        Value::Array(array) => array.set(index, value),
        other if index == 0 => {
            value.set_path(other.path().map(str::to_string));
            *other = value;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::{Environment, Fix, Strictness};
    use crate::value::Hash;

    fn run(expressions: Vec<Expression>, record: &mut Record) -> FixResult<()> {
        let registry = FixRegistry::new();
        let mut env = Environment::default();
        RecordTransformer::new(&registry, &mut env, Strictness::Process)
            .transform(&Fix::new(expressions), record)
    }

    fn person(name: &str) -> Value {
        let mut hash = Hash::new();
        hash.put("name", Value::from(name));
        Value::Hash(hash)
    }

    #[test]
    fn test_list_scoped_sub_records() {
        let mut record = Record::new();
        record.put("people[]", Value::from(vec![person("max"), person("moritz")]));

        run(
            vec![Expression::bind(
                "list",
                vec![Expression::call::<&str>("upcase", ["name"])],
            )
            .with_option("path", "people[]")],
            &mut record,
        )
        .unwrap();

        assert_eq!(record.get("people[].1.name").unwrap(), Some(Value::from("MAX")));
        assert_eq!(record.get("people[].2.name").unwrap(), Some(Value::from("MORITZ")));
    }

    #[test]
    fn test_list_with_var_sees_record() {
        let mut record = Record::new();
        record.put("prefix", Value::from("#"));
        record.put("tags", Value::from(vec![Value::from("a"), Value::from("b")]));

        run(
            vec![Expression::bind(
                "list",
                vec![
                    Expression::call("prepend", ["$i", "-"]),
                    Expression::call("copy_field", ["$i", "seen"]),
                ],
            )
            .with_option("path", "tags")
            .with_option("var", "$i")],
            &mut record,
        )
        .unwrap();

        assert_eq!(
            record.get("tags").unwrap(),
            Some(Value::from(vec![Value::from("-a"), Value::from("-b")]))
        );
        assert_eq!(
            record.get("seen").unwrap(),
            Some(Value::from(vec![Value::from("-a"), Value::from("-b")]))
        );
        assert_eq!(record.get("$i").unwrap(), None);
    }

    #[test]
    fn test_list_var_keeps_field_of_same_name() {
        let mut record = Record::new();
        record.put("item", Value::from("keep-me"));
        record.put("tags", Value::from(vec![Value::from("a"), Value::from("b")]));

        run(
            vec![Expression::bind(
                "list",
                vec![Expression::call("append", ["item", "!"])],
            )
            .with_option("path", "tags")
            .with_option("var", "item")],
            &mut record,
        )
        .unwrap();

        assert_eq!(record.get("item").unwrap(), Some(Value::from("keep-me")));
        assert_eq!(
            record.get("tags").unwrap(),
            Some(Value::from(vec![Value::from("a!"), Value::from("b!")]))
        );
        let names: Vec<&str> = record.fields().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["item", "tags"]);
    }

    #[test]
    fn test_list_without_var_requires_hashes() {
        let mut record = Record::new();
        record.put("tags", Value::from(vec![Value::from("a")]));

        let err = run(
            vec![Expression::bind("list", vec![]).with_option("path", "tags")],
            &mut record,
        )
        .unwrap_err();
        assert!(matches!(err, FixError::Value(ValueError::TypeMismatch { .. })));
    }

    #[test]
    fn test_list_reject_propagates() {
        let mut record = Record::new();
        record.put("people[]", Value::from(vec![person("max")]));

        run(
            vec![Expression::bind("list", vec![Expression::call::<&str>("reject", [])])
                .with_option("path", "people[]")],
            &mut record,
        )
        .unwrap();
        assert!(record.is_rejected());
    }

    #[test]
    fn test_list_missing_path_option() {
        let mut record = Record::new();
        let err = run(vec![Expression::bind("list", vec![])], &mut record).unwrap_err();
        assert!(matches!(err, FixError::MissingOption { .. }));
    }
}
