//! High-level transformation API.
//!
//! These functions wire the pieces together: decode the input into
//! records, run the fix over each one through [`Metafix`], and collect what
//! comes out.
//!
//! # Example
//!
//! ```rust,ignore
//! use metafix::pipeline::{transform_json, FixScript};
//! use metafix::TransformOptions;
//!
//! let script = FixScript::load("fixes/catalog.json")?;
//! let input = serde_json::json!([{"title": "ulysses"}]);
//! let result = transform_json(&input, &script, &TransformOptions::default())?;
//! println!("Emitted {} of {} records", result.emitted_count, result.input_count);
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as Json;

use crate::config::TransformOptions;
use crate::error::PipelineError;
use crate::fix::Fix;
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::stream::{Event, EventCollector, JsonDecoder, JsonEncoder, Metafix, StreamReceiver};

/// A fix and the file it came from, if any.
///
/// The file location is the base for relative `include` and map paths.
#[derive(Debug, Clone, Default)]
pub struct FixScript {
    pub fix: Fix,
    pub path: Option<PathBuf>,
}

impl FixScript {
    pub fn new(fix: Fix) -> Self {
        Self { fix, path: None }
    }

    /// Load a JSON fix file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        Ok(Self {
            fix: Fix::from_file(path)?,
            path: Some(path.to_path_buf()),
        })
    }
}

/// Result of a transformation run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Emitted records
    pub records: Vec<Json>,

    /// Number of records read
    pub input_count: usize,

    /// Number of records emitted
    pub emitted_count: usize,

    /// Number of records rejected by the fix
    pub rejected_count: usize,

    /// CSV parsing metadata, for CSV input
    pub csv_info: Option<CsvInfo>,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.records.len(),
        }
    }
}

fn record_count(input: &Json) -> Result<usize, PipelineError> {
    match input {
        Json::Object(_) => Ok(1),
        Json::Array(items) => Ok(items.len()),
        _ => Err(PipelineError::InvalidInput(
            "expected a JSON object or an array of objects".to_string(),
        )),
    }
}

/// Run `input` through the fix into `receiver` and close the stream.
pub fn run_into<R: StreamReceiver>(
    input: &Json,
    script: &FixScript,
    options: &TransformOptions,
    receiver: R,
) -> Result<R, PipelineError> {
    record_count(input)?;

    let mut metafix = Metafix::with_options(script.fix.clone(), options.clone(), receiver);
    if let Some(path) = &script.path {
        metafix = metafix.with_fix_file(path);
    }

    let mut decoder = JsonDecoder::new();
    if let Some(field) = &options.id_field {
        decoder = decoder.with_id_field(field.clone());
    }

    decoder.decode(input, &mut metafix)?;
    metafix.close_stream()?;
    Ok(metafix.into_receiver())
}

/// Transform JSON records (an object or an array of objects).
pub fn transform_json(
    input: &Json,
    script: &FixScript,
    options: &TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let input_count = record_count(input)?;
    log::info!("Transforming {} record(s)", input_count);

    let records = run_into(input, script, options, JsonEncoder::new())?.into_records();
    let emitted_count = records.len();
    let rejected_count = input_count.saturating_sub(emitted_count);

    log::info!("Emitted {} record(s), rejected {}", emitted_count, rejected_count);
    Ok(PipelineResult {
        records,
        input_count,
        emitted_count,
        rejected_count,
        csv_info: None,
    })
}

/// Transform a CSV file, one record per row.
pub fn transform_csv(
    path: &Path,
    script: &FixScript,
    options: &TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let parsed = parse_csv_file_auto(path)?;
    transform_parsed(parsed, script, options)
}

/// Transform CSV bytes, one record per row.
pub fn transform_bytes(
    bytes: &[u8],
    script: &FixScript,
    options: &TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let parsed = parse_bytes_auto(bytes)?;
    transform_parsed(parsed, script, options)
}

fn transform_parsed(
    parsed: ParseResult,
    script: &FixScript,
    options: &TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    log::info!(
        "Read {} CSV rows (encoding {}, delimiter {:?})",
        parsed.records.len(),
        parsed.encoding,
        parsed.delimiter
    );
    let csv_info = CsvInfo::from(&parsed);

    let mut result = transform_json(&Json::Array(parsed.records), script, options)?;
    result.csv_info = Some(csv_info);
    Ok(result)
}

/// The event stream the fix emits for `input`.
pub fn collect_events(
    input: &Json,
    script: &FixScript,
    options: &TransformOptions,
) -> Result<Vec<Event>, PipelineError> {
    Ok(run_into(input, script, options, EventCollector::new())?.into_events())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FixError, StreamError};
    use crate::fix::{Expression, Strictness};
    use serde_json::json;

    fn script(expressions: Vec<Expression>) -> FixScript {
        FixScript::new(Fix::new(expressions))
    }

    #[test]
    fn test_transform_json() {
        let input = json!([
            {"title": "ulysses", "year": "1922"},
            {"title": "dubliners", "year": "1914"}
        ]);
        let script = script(vec![
            Expression::call::<&str>("upcase", ["title"]),
            Expression::call("move_field", ["year", "date.year"]),
        ]);

        let result = transform_json(&input, &script, &TransformOptions::default()).unwrap();
        assert_eq!(result.emitted_count, 2);
        assert_eq!(result.records[0], json!({"title": "ULYSSES", "date": {"year": "1922"}}));
    }

    #[test]
    fn test_rejected_records_counted() {
        let input = json!([{"keep": "no"}, {"keep": "yes"}]);
        let script = script(vec![Expression::when(
            "any_equal",
            ["keep", "no"],
            vec![Expression::call::<&str>("reject", [])],
        )]);

        let result = transform_json(&input, &script, &TransformOptions::default()).unwrap();
        assert_eq!(result.input_count, 2);
        assert_eq!(result.rejected_count, 1);
        assert_eq!(result.records, vec![json!({"keep": "yes"})]);
    }

    #[test]
    fn test_strictness_record_continues() {
        // JSON arrays fold into fields carrying the `[]` marker.
        let input = json!([{"n": ["1", "x"]}, {"n": ["1", "2"]}]);
        let script = script(vec![Expression::call::<&str>("sum", ["n[]"])]);
        let options = TransformOptions::default().with_strictness(Strictness::Record);

        let result = transform_json(&input, &script, &options).unwrap();
        assert_eq!(result.rejected_count, 1);
        assert_eq!(result.records, vec![json!({"n[]": "3"})]);
    }

    #[test]
    fn test_strictness_process_aborts() {
        let input = json!([{"n": ["1", "x"]}]);
        let script = script(vec![Expression::call::<&str>("sum", ["n[]"])]);

        let err = transform_json(&input, &script, &TransformOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stream(StreamError::Fix(FixError::Execution { .. }))
        ));
    }

    #[test]
    fn test_transform_bytes_csv() {
        let csv = "id;title\n1;a\n2;b";
        let options = TransformOptions {
            id_field: Some("id".to_string()),
            ..TransformOptions::default()
        };
        let script = script(vec![Expression::call("paste", ["label", "id", "title"])]);

        let result = transform_bytes(csv.as_bytes(), &script, &options).unwrap();
        assert_eq!(result.records[1]["label"], "2 b");
        assert_eq!(result.csv_info.unwrap().headers, vec!["id", "title"]);
    }

    #[test]
    fn test_collect_events_uses_record_ids() {
        let options = TransformOptions {
            id_field: Some("id".to_string()),
            ..TransformOptions::default()
        };
        let events = collect_events(&json!({"id": "x7"}), &script(vec![]), &options).unwrap();
        assert_eq!(events.first(), Some(&Event::start_record("x7")));
        assert_eq!(events.last(), Some(&Event::CloseStream));
    }

    #[test]
    fn test_example_fix() {
        let input = json!({
            "author": "Joyce",
            "title": " ulysses ",
            "subjects": "novel;modernism",
            "language": "en",
            "year": "1922"
        });

        let options = TransformOptions {
            repeated_fields_to_entities: false,
            ..TransformOptions::default()
        };
        let result = transform_json(&input, &FixScript::new(Fix::example()), &options).unwrap();
        let record = &result.records[0];
        assert_eq!(record["creator"]["name"], "Joyce");
        assert_eq!(record["title"], "ulysses");
        assert_eq!(record["subjects"], json!(["Novel", "Modernism"]));
        assert_eq!(record["language"], "English");
        assert_eq!(record["era"], "historic");
        assert!(record.get("author").is_none());
    }

    #[test]
    fn test_invalid_input() {
        let err = transform_json(&json!("text"), &script(vec![]), &TransformOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_fix_script_include_resolves_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.json"),
            r#"{"expressions": [{"type": "call", "name": "include", "params": ["sub.json"]}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("sub.json"),
            r#"[{"type": "call", "name": "add_field", "params": ["from_sub", "yes"]}]"#,
        )
        .unwrap();

        let script = FixScript::load(dir.path().join("main.json")).unwrap();
        let result = transform_json(&json!({"a": "1"}), &script, &TransformOptions::default()).unwrap();
        assert_eq!(result.records[0]["from_sub"], "yes");
    }
}
