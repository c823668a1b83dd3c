//! CSV input with encoding and delimiter auto-detection.
//!
//! Each data row becomes a flat JSON object keyed by the header row, ready
//! to be decoded into records.

use std::path::Path;

use serde_json::{Map, Value};

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    fn from_csv(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();
        Self::new(line, err.to_string())
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// One JSON object per data row
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Candidate delimiters, in order of preference on ties.
const DELIMITERS: [char; 4] = [';', ',', '\t', '|'];

/// Lines looked at when sniffing the delimiter.
const SNIFF_LINES: usize = 10;

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(encoding) if encoding != encoding_rs::UTF_8 => encoding.decode(bytes).0.into_owned(),
            _ => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Detect the delimiter from the first lines.
///
/// A delimiter that splits every sampled line into the same number of
/// columns wins over one that is merely frequent in the header.
pub fn detect_delimiter(content: &str) -> char {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let Some(header) = sample.first() else {
        return DELIMITERS[0];
    };

    let mut best = (DELIMITERS[0], false, 0);
    for sep in DELIMITERS {
        let count = header.matches(sep).count();
        if count == 0 {
            continue;
        }
        let consistent = sample.iter().all(|line| line.matches(sep).count() == count);
        if (consistent, count) > (best.1, best.2) {
            best = (sep, consistent, count);
        }
    }
    best.0
}

/// Parse CSV text with an explicit delimiter.
///
/// Rows shorter than the header get empty values, extra columns are
/// ignored, and blank lines are skipped.
pub fn parse_str(content: &str, delimiter: char) -> Result<Vec<Value>, CsvError> {
    Ok(parse_with_headers(content, delimiter)?.1)
}

fn parse_with_headers(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<Value>), CsvError> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::new(0, format!("Delimiter '{}' is not a single byte", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(CsvError::from_csv)?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(CsvError::from_csv)?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let object: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                (
                    header.clone(),
                    Value::String(row.get(i).unwrap_or_default().to_string()),
                )
            })
            .collect();
        records.push(Value::Object(object));
    }

    Ok((headers, records))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    log::debug!("CSV encoding {}, delimiter {:?}", encoding, delimiter);

    let (headers, records) = parse_with_headers(&content, delimiter)?;
    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e))
    })?;
    parse_bytes_auto(&bytes)
}
