//! Built-in methods.
//!
//! Script level methods configure the session, record level methods
//! restructure the record, field level methods rewrite the value(s) at a
//! path. Numeric parse failures and non-string values where strings are
//! required are execution errors; bad regular expressions are not.

use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use regex::Regex;

use super::ast::Options;
use super::registry::{FixRegistry, MethodFn};
use super::transformer::RecordTransformer;
use crate::error::{FixError, FixResult, MapError};
use crate::maps::{FileMap, LookupMap, DEFAULT_SEPARATOR};
use crate::record::Record;
use crate::value::{merge_values, Array, Hash, Value};

/// Suffix of paths that append to an existing list.
const APPEND_SUFFIX: &str = ".$append";

/// Prefix marking a literal `paste` source.
const LITERAL_PREFIX: char = '~';

const SEPARATOR_OPTION: &str = "sep_char";
const JOIN_CHAR_OPTION: &str = "join_char";
const DEFAULT_SPLIT_PATTERN: &str = r"\s+";

type Method = fn(&mut RecordTransformer<'_>, &mut Record, &[String], &Options) -> FixResult<()>;

pub(super) fn register_all(registry: &mut FixRegistry) {
    let methods: [(&str, Method); 39] = [
        // script level
        ("include", include),
        ("nothing", nothing),
        ("put_filemap", put_filemap),
        ("put_map", put_map),
        // record level
        ("add_field", add_field),
        ("array", array),
        ("copy_field", copy_field),
        ("format", format),
        ("hash", hash),
        ("move_field", move_field),
        ("parse_text", parse_text),
        ("paste", paste),
        ("random", random),
        ("reject", reject),
        ("remove_field", remove_field),
        ("rename", rename),
        ("retain", retain),
        ("set_array", set_array),
        ("set_field", set_field),
        ("set_hash", set_hash),
        ("vacuum", vacuum),
        // field level
        ("append", append),
        ("capitalize", capitalize),
        ("count", count),
        ("downcase", downcase),
        ("filter", filter),
        ("index", index),
        ("join_field", join_field),
        ("lookup", lookup),
        ("prepend", prepend),
        ("replace_all", replace_all),
        ("reverse", reverse),
        ("sort_field", sort_field),
        ("split_field", split_field),
        ("substring", substring),
        ("sum", sum),
        ("trim", trim),
        ("uniq", uniq),
        ("upcase", upcase),
    ];

    for (name, method) in methods {
        registry.install_method(name, Arc::new(method) as MethodFn);
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(super) fn param<'p>(command: &str, params: &'p [String], index: usize) -> FixResult<&'p str> {
    params
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| FixError::MissingParameter {
            command: command.to_string(),
            index,
        })
}

pub(super) fn compile(pattern: &str) -> FixResult<Regex> {
    Regex::new(pattern).map_err(|source| FixError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compile `pattern` so that it must match the whole input.
pub(super) fn compile_full(pattern: &str) -> FixResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| FixError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn flag(options: &Options, key: &str) -> bool {
    options
        .get(key)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn parse_number<T>(command: &str, text: &str) -> FixResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.trim().parse().map_err(|e| {
        FixError::execution(command, format!("cannot parse '{}' as a number: {}", text, e))
    })
}

/// The string elements of `array`, failing on anything else.
fn strings(command: &str, array: &Array) -> FixResult<Vec<String>> {
    array
        .iter()
        .map(|value| {
            value.as_str().map(str::to_string).ok_or_else(|| {
                FixError::execution(command, format!("expected strings, got {}", value.value_type()))
            })
        })
        .collect()
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Apply a string operator to every leaf at `params[0]`.
fn map_leaves(
    command: &str,
    record: &mut Record,
    params: &[String],
    mut operator: impl FnMut(&str) -> String,
) -> FixResult<()> {
    let field = param(command, params, 0)?;
    record.transform(field, &mut |s: &str| -> FixResult<Option<String>> { Ok(Some(operator(s))) })
}

// =============================================================================
// Script level
// =============================================================================

fn include(tf: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let path = tf.environment().resolve_path(param("include", params, 0)?);
    let fix = tf.environment_mut().include(&path)?;

    let previous = tf.environment_mut().swap_fix_file(Some(path));
    let result = tf.process(&fix.expressions, record);
    tf.environment_mut().swap_fix_file(previous);
    result
}

fn nothing(_: &mut RecordTransformer<'_>, _: &mut Record, _: &[String], _: &Options) -> FixResult<()> {
    Ok(())
}

fn put_filemap(tf: &mut RecordTransformer<'_>, _: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let file = param("put_filemap", params, 0)?;
    let name = params.get(1).map(String::as_str).unwrap_or(file);
    register_file_map(tf, file, name, options)
}

fn register_file_map(tf: &mut RecordTransformer<'_>, file: &str, name: &str, options: &Options) -> FixResult<()> {
    // Registered once per session so the loaded entries survive across records.
    if tf.environment().maps().contains(name) {
        return Ok(());
    }

    let separator = match options.get(SEPARATOR_OPTION) {
        Some(sep) => single_char(sep).ok_or_else(|| MapError::InvalidSeparator(sep.clone()))?,
        None => DEFAULT_SEPARATOR,
    };
    let map = FileMap::new(tf.environment().resolve_path(file), separator)?;
    tf.environment_mut().maps_mut().put_file_map(name, map);
    Ok(())
}

fn put_map(tf: &mut RecordTransformer<'_>, _: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let name = param("put_map", params, 0)?;
    tf.environment_mut().maps_mut().put_map(name, options.clone());
    Ok(())
}

// =============================================================================
// Record level
// =============================================================================

fn add_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("add_field", params, 0)?;
    let value = param("add_field", params, 1)?;
    Ok(record.append(field, Value::from(value))?)
}

/// Hash to flat `[key, value, key, value, ...]` array.
fn array(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("array", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        Ok(Some(match value {
            Value::Hash(hash) => {
                let mut array = Array::new();
                for (key, value) in hash {
                    array.add(Value::from(key));
                    array.add(value);
                }
                Value::Array(array)
            }
            other => other,
        }))
    })
}

fn copy_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let from = param("copy_field", params, 0)?;
    let to = param("copy_field", params, 1)?;
    Ok(record.copy_field(from, to)?)
}

/// Fill `%s` placeholders with the values of the field, in order.
fn format(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("format", params, 0)?;
    let template = param("format", params, 1)?;

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let mut values = value.as_list().iter().map(Value::to_string).collect::<Vec<_>>().into_iter();
        let mut formatted = String::new();
        let mut rest = template;
        while let Some(pos) = rest.find("%s") {
            formatted.push_str(&rest[..pos]);
            formatted.push_str(&values.next().unwrap_or_default());
            rest = &rest[pos + 2..];
        }
        formatted.push_str(rest);
        Ok(Some(Value::from(formatted)))
    })
}

/// Flat `[key, value, ...]` array to hash.
fn hash(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("hash", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let Value::Array(array) = value else {
            return Ok(Some(value));
        };

        let mut hash = Hash::new();
        let items = array.into_vec();
        for pair in items.chunks_exact(2) {
            hash.put(pair[0].to_string(), pair[1].clone());
        }
        Ok(Some(Value::Hash(hash)))
    })
}

fn move_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let from = param("move_field", params, 0)?;
    let to = param("move_field", params, 1)?;
    record.copy_field(from, to)?;
    record.remove(from);
    Ok(())
}

/// Split strings into named (hash) or positional (values) capture groups.
fn parse_text(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("parse_text", params, 0)?;
    let regex = compile_full(param("parse_text", params, 1)?)?;
    let names: Vec<&str> = regex.capture_names().flatten().collect();

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let mut parsed = Vec::new();
        for item in value.as_list().iter() {
            let Some(captures) = item.as_str().and_then(|s| regex.captures(s)) else {
                continue;
            };

            if names.is_empty() {
                parsed.extend(
                    captures
                        .iter()
                        .skip(1)
                        .map(|group| Value::from(group.map_or("", |m| m.as_str()))),
                );
            } else {
                let hash: Hash = names
                    .iter()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.to_string(), Value::from(m.as_str())))
                    })
                    .collect();
                parsed.push(Value::Hash(hash));
            }
        }

        if parsed.is_empty() {
            return Ok(Some(value));
        }
        Ok(merge_values(parsed))
    })
}

/// Join field values and `~literals` into one string.
fn paste(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let target = param("paste", params, 0)?;
    let join_char = options.get(JOIN_CHAR_OPTION).map(String::as_str).unwrap_or(" ");

    let mut parts = Vec::new();
    for source in &params[1..] {
        if let Some(literal) = source.strip_prefix(LITERAL_PREFIX) {
            parts.push(literal.to_string());
        } else if let Some(value) = record.get(source)? {
            if let Some(first) = value.as_list().first() {
                parts.push(first.to_string());
            }
        }
    }

    Ok(record.set(target, Value::from(parts.join(join_char)))?)
}

fn random(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("random", params, 0)?;
    let max: u64 = parse_number("random", param("random", params, 1)?)?;
    if max == 0 {
        return Err(FixError::execution("random", "max must be greater than 0"));
    }

    let value = rand::thread_rng().gen_range(0..max);
    Ok(record.set(field, Value::from(value.to_string()))?)
}

fn reject(_: &mut RecordTransformer<'_>, record: &mut Record, _: &[String], _: &Options) -> FixResult<()> {
    record.set_reject(true);
    Ok(())
}

fn remove_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    for field in params {
        record.remove(field);
    }
    Ok(())
}

/// Rewrite keys below `path` with a regex replacement.
fn rename(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("rename", params, 0)?;
    let search = compile(param("rename", params, 1)?)?;
    let replacement = param("rename", params, 2)?;

    fn rename_value(value: &Value, search: &Regex, replacement: &str) -> Value {
        value
            .match_type()
            .if_array(|a| Value::Array(a.iter().map(|v| rename_value(v, search, replacement)).collect()))
            .if_hash(|h| {
                Value::Hash(
                    h.iter()
                        .map(|(k, v)| {
                            (
                                search.replace_all(k, replacement).into_owned(),
                                rename_value(v, search, replacement),
                            )
                        })
                        .collect(),
                )
            })
            .or_else(Value::clone)
    }

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        value
            .match_type()
            .if_array(|_| ())
            .if_hash(|_| ())
            .or_else_throw()?;
        Ok(Some(rename_value(&value, &search, replacement)))
    })
}

fn retain(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    record.retain_fields(params);
    Ok(())
}

fn set_array(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("set_array", params, 0)?;
    let values = &params[1..];

    if let Some(base) = field.strip_suffix(APPEND_SUFFIX) {
        for value in values {
            record.append(base, Value::from(value))?;
        }
        return Ok(());
    }

    let array: Array = values.iter().map(Value::from).collect();
    Ok(record.set(field, Value::Array(array))?)
}

fn set_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("set_field", params, 0)?;
    let value = param("set_field", params, 1)?;
    Ok(record.set(field, Value::from(value))?)
}

fn set_hash(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let field = param("set_hash", params, 0)?;
    let hash: Hash = options
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v)))
        .collect();

    if let Some(base) = field.strip_suffix(APPEND_SUFFIX) {
        let existing = record.get(base)?;
        return Ok(match existing {
            Some(Value::Array(_)) => record.append(base, Value::Hash(hash))?,
            _ => record.set(base, Value::Hash(hash))?,
        });
    }

    Ok(record.set(field, Value::Hash(hash))?)
}

fn vacuum(_: &mut RecordTransformer<'_>, record: &mut Record, _: &[String], _: &Options) -> FixResult<()> {
    record.remove_empty_values();
    Ok(())
}

// =============================================================================
// Field level: per string leaf
// =============================================================================

fn append(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let suffix = param("append", params, 1)?.to_string();
    map_leaves("append", record, params, |s| format!("{}{}", s, suffix))
}

fn prepend(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let prefix = param("prepend", params, 1)?.to_string();
    map_leaves("prepend", record, params, |s| format!("{}{}", prefix, s))
}

fn capitalize(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    map_leaves("capitalize", record, params, |s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    })
}

fn downcase(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    map_leaves("downcase", record, params, str::to_lowercase)
}

fn upcase(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    map_leaves("upcase", record, params, str::to_uppercase)
}

fn trim(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    map_leaves("trim", record, params, |s| s.trim().to_string())
}

/// Character position of the first occurrence, or -1.
fn index(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let search = param("index", params, 1)?.to_string();
    map_leaves("index", record, params, |s| match s.find(search.as_str()) {
        Some(byte) => s[..byte].chars().count().to_string(),
        None => "-1".to_string(),
    })
}

fn replace_all(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let search = compile(param("replace_all", params, 1)?)?;
    let replacement = param("replace_all", params, 2)?.to_string();
    map_leaves("replace_all", record, params, |s| {
        search.replace_all(s, replacement.as_str()).into_owned()
    })
}

/// `substring(path, start, length?)`, counted in characters.
fn substring(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let start: usize = parse_number("substring", param("substring", params, 1)?)?;
    let length: Option<usize> = params
        .get(2)
        .map(|l| parse_number("substring", l))
        .transpose()?;

    map_leaves("substring", record, params, |s| {
        let chars = s.chars().skip(start);
        match length {
            Some(length) => chars.take(length).collect(),
            None => chars.collect(),
        }
    })
}

/// Map each leaf through a lookup map. Keys without an entry or default are
/// removed.
fn lookup(tf: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let field = param("lookup", params, 0)?;

    let inline;
    let map = match params.get(1) {
        Some(name) => {
            register_file_map(tf, name, name, options)?;
            tf.environment()
                .maps()
                .get(name)
                .ok_or_else(|| FixError::execution("lookup", format!("unknown map '{}'", name)))?
        }
        None => {
            inline = LookupMap::Inline(options.clone());
            &inline
        }
    };

    record.transform(field, &mut |s: &str| -> FixResult<Option<String>> {
        Ok(map.get_or_default(s)?)
    })
}

// =============================================================================
// Field level: whole value
// =============================================================================

fn count(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("count", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        Ok(Some(match &value {
            Value::Array(a) => Value::from(a.len().to_string()),
            Value::Hash(h) => Value::from(h.len().to_string()),
            Value::String(_) => value,
        }))
    })
}

fn filter(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let field = param("filter", params, 0)?;
    let search = compile(param("filter", params, 1)?)?;
    let invert = flag(options, "invert");

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let Value::Array(array) = value else {
            return Ok(Some(value));
        };
        let kept: Array = array
            .into_iter()
            .filter(|v| v.as_str().is_some_and(|s| search.is_match(s)) != invert)
            .collect();
        Ok(Some(Value::Array(kept)))
    })
}

fn join_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("join_field", params, 0)?;
    let separator = params.get(1).map(String::as_str).unwrap_or("");

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        match &value {
            Value::Array(array) => Ok(Some(Value::from(strings("join_field", array)?.join(separator)))),
            _ => Ok(Some(value)),
        }
    })
}

fn reverse(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("reverse", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        Ok(Some(match value {
            Value::Array(array) => Value::from(array.into_iter().rev().collect::<Vec<_>>()),
            Value::String(s) => Value::from(s.chars().rev().collect::<String>()),
            other => other,
        }))
    })
}

fn sort_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], options: &Options) -> FixResult<()> {
    let field = param("sort_field", params, 0)?;
    let numeric = flag(options, "numeric");
    let reverse = flag(options, "reverse");
    let uniq = flag(options, "uniq");

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let Value::Array(array) = &value else {
            return Ok(Some(value));
        };

        let mut items = strings("sort_field", array)?;
        if uniq {
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.clone()));
        }

        if numeric {
            let mut keyed = items
                .into_iter()
                .map(|item| Ok((parse_number::<i64>("sort_field", &item)?, item)))
                .collect::<FixResult<Vec<_>>>()?;
            keyed.sort_by_key(|(key, _)| *key);
            items = keyed.into_iter().map(|(_, item)| item).collect();
        } else {
            items.sort();
        }

        if reverse {
            items.reverse();
        }
        Ok(Some(items.into_iter().map(Value::from).collect::<Vec<_>>().into()))
    })
}

fn split_field(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("split_field", params, 0)?;
    let pattern = params.get(1).map(String::as_str).unwrap_or(DEFAULT_SPLIT_PATTERN);
    let separator = compile(pattern)?;

    let split = |s: &str| -> Value { separator.split(s).map(Value::from).collect::<Vec<_>>().into() };

    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        Ok(Some(match &value {
            Value::String(s) => split(s),
            Value::Array(array) => Value::Array(
                strings("split_field", array)?
                    .iter()
                    .map(|s| split(s))
                    .collect(),
            ),
            Value::Hash(hash) => {
                let mut split_hash = Hash::new();
                for (key, item) in hash {
                    let text = item.as_str().ok_or_else(|| {
                        FixError::execution("split_field", format!("expected strings, got {}", item.value_type()))
                    })?;
                    split_hash.put(key.clone(), split(text));
                }
                Value::Hash(split_hash)
            }
        }))
    })
}

fn sum(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("sum", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let Value::Array(array) = &value else {
            return Ok(Some(value));
        };

        let mut total: i64 = 0;
        for item in strings("sum", array)? {
            let n = parse_number::<i64>("sum", &item)?;
            total = total
                .checked_add(n)
                .ok_or_else(|| FixError::execution("sum", format!("sum overflows at '{}'", item)))?;
        }
        Ok(Some(Value::from(total.to_string())))
    })
}

fn uniq(_: &mut RecordTransformer<'_>, record: &mut Record, params: &[String], _: &Options) -> FixResult<()> {
    let field = param("uniq", params, 0)?;
    record.transform_value(field, |value| -> FixResult<Option<Value>> {
        let Value::Array(array) = value else {
            return Ok(Some(value));
        };

        let mut unique: Vec<Value> = Vec::new();
        for item in array {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Ok(Some(unique.into()))
    })
}
