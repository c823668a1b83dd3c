//! Built-in conditionals for `if` and `unless`.

use std::sync::Arc;

use super::ast::Options;
use super::methods::{compile_full, param};
use super::registry::{ConditionalFn, FixRegistry};
use crate::error::{FixError, FixResult};
use crate::record::Record;
use crate::value::{merge_values, Value};

type Conditional = fn(&Record, &[String], &Options) -> FixResult<bool>;

#[derive(Debug, Clone, Copy)]
enum Quantifier {
    All,
    Any,
}

pub(super) fn register_all(registry: &mut FixRegistry) {
    let conditionals: [(&str, Conditional); 16] = [
        ("all_contain", |r, p, _| quantified(r, p, "all_contain", Quantifier::All, contains)),
        ("any_contain", |r, p, _| quantified(r, p, "any_contain", Quantifier::Any, contains)),
        ("none_contain", |r, p, _| {
            Ok(!quantified(r, p, "none_contain", Quantifier::Any, contains)?)
        }),
        ("all_equal", |r, p, _| quantified(r, p, "all_equal", Quantifier::All, equals)),
        ("any_equal", |r, p, _| quantified(r, p, "any_equal", Quantifier::Any, equals)),
        ("none_equal", |r, p, _| {
            Ok(!quantified(r, p, "none_equal", Quantifier::Any, equals)?)
        }),
        ("all_match", |r, p, _| matches(r, p, "all_match", Quantifier::All)),
        ("any_match", |r, p, _| matches(r, p, "any_match", Quantifier::Any)),
        ("none_match", |r, p, _| Ok(!matches(r, p, "none_match", Quantifier::Any)?)),
        ("exists", exists),
        ("is_true", |r, p, _| {
            test_strings(r, p, "is_true", |s| s == "true" || s == "1")
        }),
        ("is_false", |r, p, _| {
            test_strings(r, p, "is_false", |s| s == "false" || s == "0")
        }),
        ("is_number", |r, p, _| {
            test_strings(r, p, "is_number", |s| parse_number(s).is_some())
        }),
        ("is_empty", is_empty),
        ("greater_than", |r, p, _| compare(r, p, "greater_than", |n, bound| n > bound)),
        ("less_than", |r, p, _| compare(r, p, "less_than", |n, bound| n < bound)),
    ];

    for (name, conditional) in conditionals {
        registry.install_conditional(name, Arc::new(conditional) as ConditionalFn);
    }
}

/// Values of a comma separated list of fields, merged.
fn field_values(record: &Record, fields: &str) -> FixResult<Option<Value>> {
    let mut values = Vec::new();
    for field in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        values.extend(record.get(field)?);
    }
    Ok(merge_values(values))
}

/// Test every element at the field; only strings can pass. An absent field
/// is false.
fn quantify(
    record: &Record,
    fields: &str,
    quantifier: Quantifier,
    mut predicate: impl FnMut(&str) -> bool,
) -> FixResult<bool> {
    let Some(value) = field_values(record, fields)? else {
        return Ok(false);
    };

    let list = value.as_list();
    let mut test = |v: &Value| v.as_str().is_some_and(&mut predicate);
    Ok(match quantifier {
        Quantifier::All => list.iter().all(&mut test),
        Quantifier::Any => list.iter().any(&mut test),
    })
}

fn contains(value: &str, target: &str) -> bool {
    value.contains(target)
}

fn equals(value: &str, target: &str) -> bool {
    value == target
}

fn quantified(
    record: &Record,
    params: &[String],
    command: &str,
    quantifier: Quantifier,
    test: fn(&str, &str) -> bool,
) -> FixResult<bool> {
    let fields = param(command, params, 0)?;
    let target = param(command, params, 1)?;
    quantify(record, fields, quantifier, |value| test(value, target))
}

fn matches(record: &Record, params: &[String], command: &str, quantifier: Quantifier) -> FixResult<bool> {
    let fields = param(command, params, 0)?;
    let regex = compile_full(param(command, params, 1)?)?;
    quantify(record, fields, quantifier, |value| regex.is_match(value))
}

fn exists(record: &Record, params: &[String], _: &Options) -> FixResult<bool> {
    let fields = param("exists", params, 0)?;
    Ok(field_values(record, fields)?.is_some())
}

fn is_empty(record: &Record, params: &[String], _: &Options) -> FixResult<bool> {
    let fields = param("is_empty", params, 0)?;
    Ok(field_values(record, fields)?.is_some_and(|value| value.is_empty()))
}

fn test_strings(
    record: &Record,
    params: &[String],
    command: &str,
    predicate: impl FnMut(&str) -> bool,
) -> FixResult<bool> {
    let fields = param(command, params, 0)?;
    quantify(record, fields, Quantifier::Any, predicate)
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare(
    record: &Record,
    params: &[String],
    command: &str,
    ordering: fn(f64, f64) -> bool,
) -> FixResult<bool> {
    let fields = param(command, params, 0)?;
    let bound = param(command, params, 1)?;
    let bound = parse_number(bound)
        .ok_or_else(|| FixError::execution(command, format!("'{}' is not a number", bound)))?;

    quantify(record, fields, Quantifier::Any, |value| {
        parse_number(value).is_some_and(|n| ordering(n, bound))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let mut record = Record::new();
        record.put("data1", Value::from("A"));
        record.put("data2", Value::from("B"));
        record.put(
            "list",
            Value::from(vec![Value::from("Aa"), Value::from("Ab"), Value::from("Ba")]),
        );
        record.put("tags", Value::from(vec![Value::from("x1"), Value::from("x2")]));
        record
    }

    fn check(name: &str, params: &[&str]) -> bool {
        let registry = FixRegistry::new();
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        (registry.conditional(name).unwrap())(&record(), &params, &Options::new()).unwrap()
    }

    #[test]
    fn test_quantified_equal() {
        assert!(check("any_equal", &["data1,data2", "A"]));
        assert!(!check("all_equal", &["data1,data2", "A"]));
        assert!(!check("none_equal", &["data1,data2", "A"]));
        assert!(check("none_equal", &["data1,data2", "C"]));
        assert!(check("all_equal", &["data1", "A"]));
    }

    #[test]
    fn test_quantified_contain_over_list() {
        assert!(check("any_contain", &["list", "b"]));
        assert!(!check("all_contain", &["list", "A"]));
        assert!(check("all_contain", &["tags", "x"]));
        assert!(check("none_contain", &["list", "z"]));
    }

    #[test]
    fn test_match_is_full_string() {
        assert!(check("any_match", &["data1", "A"]));
        assert!(!check("any_match", &["list", "a"]));
        assert!(check("all_match", &["list", "[AB][ab]"]));
        assert!(check("none_match", &["data2", "A.*"]));
    }

    #[test]
    fn test_missing_field_is_false() {
        assert!(!check("all_equal", &["missing", "A"]));
        assert!(!check("any_equal", &["missing", "A"]));
        assert!(check("none_equal", &["missing", "A"]));
        assert!(!check("exists", &["missing"]));
        assert!(check("exists", &["data1"]));
    }

    #[test]
    fn test_only_strings_are_tested() {
        let mut record = Record::new();
        record.set("nested.x", Value::from("A")).unwrap();
        let registry = FixRegistry::new();
        let params = vec!["nested".to_string(), "A".to_string()];
        let any_equal = registry.conditional("any_equal").unwrap();
        assert!(!any_equal(&record, &params, &Options::new()).unwrap());
    }

    #[test]
    fn test_value_predicates() {
        let mut record = Record::new();
        record.put("t", Value::from("1"));
        record.put("f", Value::from("false"));
        record.put("n", Value::from("4.5"));
        record.put("e", Value::from(""));
        let registry = FixRegistry::new();

        let run = |name: &str, params: &[&str]| {
            let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
            (registry.conditional(name).unwrap())(&record, &params, &Options::new()).unwrap()
        };

        assert!(run("is_true", &["t"]));
        assert!(!run("is_true", &["f"]));
        assert!(run("is_false", &["f"]));
        assert!(run("is_number", &["n"]));
        assert!(!run("is_number", &["f"]));
        assert!(run("is_empty", &["e"]));
        assert!(!run("is_empty", &["n"]));
        assert!(run("greater_than", &["n", "4"]));
        assert!(!run("less_than", &["n", "4"]));
    }

    #[test]
    fn test_compare_bad_bound_is_execution_error() {
        let registry = FixRegistry::new();
        let params = vec!["data1".to_string(), "x".to_string()];
        let err = (registry.conditional("greater_than").unwrap())(&record(), &params, &Options::new())
            .unwrap_err();
        assert!(err.is_execution());
    }
}
