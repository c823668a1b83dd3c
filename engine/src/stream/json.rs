//! JSON in and out of event streams.
//!
//! The decoder turns each JSON object into one record: nested objects
//! become entities, arrays become `name[]` entities with numbered members.
//! The encoder does the reverse and collects one JSON object per record.

use serde_json::{Map, Value as Json};

use super::StreamReceiver;
use crate::error::{StreamError, StreamResult};
use crate::path::ARRAY_MARKER;

// =============================================================================
// Decoder
// =============================================================================

/// Sends JSON objects to a receiver as records.
#[derive(Debug, Default, Clone)]
pub struct JsonDecoder {
    id_field: Option<String>,
    count: usize,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take record ids from this top level field. Records without it are
    /// numbered.
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    /// Decode an object, or an array of objects.
    pub fn decode<R: StreamReceiver + ?Sized>(&mut self, input: &Json, receiver: &mut R) -> StreamResult<()> {
        match input {
            Json::Object(object) => self.decode_record(object, receiver),
            Json::Array(items) => {
                for item in items {
                    let Json::Object(object) = item else {
                        return Err(StreamError::InvalidInput(format!(
                            "expected an object, got {}",
                            type_name(item)
                        )));
                    };
                    self.decode_record(object, receiver)?;
                }
                Ok(())
            }
            other => Err(StreamError::InvalidInput(format!(
                "expected an object or an array of objects, got {}",
                type_name(other)
            ))),
        }
    }

    /// Decode JSON text.
    pub fn decode_str<R: StreamReceiver + ?Sized>(&mut self, input: &str, receiver: &mut R) -> StreamResult<()> {
        let json: Json =
            serde_json::from_str(input).map_err(|e| StreamError::InvalidInput(e.to_string()))?;
        self.decode(&json, receiver)
    }

    /// Send one object as a record.
    pub fn decode_record<R: StreamReceiver + ?Sized>(
        &mut self,
        object: &Map<String, Json>,
        receiver: &mut R,
    ) -> StreamResult<()> {
        self.count += 1;
        let id = self
            .id_field
            .as_deref()
            .and_then(|field| object.get(field))
            .and_then(scalar_text)
            .unwrap_or_else(|| self.count.to_string());

        receiver.start_record(&id)?;
        for (name, value) in object {
            decode_value(name, value, receiver)?;
        }
        receiver.end_record()
    }
}

fn type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn scalar_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decode_value<R: StreamReceiver + ?Sized>(name: &str, value: &Json, receiver: &mut R) -> StreamResult<()> {
    match value {
        Json::Null => Ok(()),
        Json::Object(object) => {
            receiver.start_entity(name)?;
            for (field, value) in object {
                decode_value(field, value, receiver)?;
            }
            receiver.end_entity()
        }
        Json::Array(items) => {
            if name.ends_with(ARRAY_MARKER) {
                receiver.start_entity(name)?;
            } else {
                receiver.start_entity(&format!("{}{}", name, ARRAY_MARKER))?;
            }
            for (index, item) in items.iter().enumerate() {
                decode_value(&(index + 1).to_string(), item, receiver)?;
            }
            receiver.end_entity()
        }
        scalar => match scalar_text(scalar) {
            Some(text) => receiver.literal(name, &text),
            None => Ok(()),
        },
    }
}

// =============================================================================
// Encoder
// =============================================================================

#[derive(Debug)]
struct Frame {
    name: String,
    value: Json,
}

/// Collects records as JSON objects.
///
/// `name[]` entities become arrays under `name`; repeated names in an
/// object become arrays.
#[derive(Debug, Default)]
pub struct JsonEncoder {
    stack: Vec<Frame>,
    records: Vec<Json>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Json] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Json> {
        self.records
    }

    /// All records as one JSON array.
    pub fn to_json_string(&self, pretty: bool) -> serde_json::Result<String> {
        let array = Json::Array(self.records.clone());
        if pretty {
            serde_json::to_string_pretty(&array)
        } else {
            serde_json::to_string(&array)
        }
    }

    fn top(&mut self) -> StreamResult<&mut Json> {
        self.stack
            .last_mut()
            .map(|frame| &mut frame.value)
            .ok_or(StreamError::EntitiesNotBalanced)
    }
}

/// Add `value` under `name`, turning repeated names into arrays.
fn insert(container: &mut Json, name: &str, value: Json) {
    match container {
        Json::Array(items) => items.push(value),
        Json::Object(object) => match object.get_mut(name) {
            Some(Json::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Json::Array(vec![first, value]);
            }
            None => {
                object.insert(name.to_string(), value);
            }
        },
        _ => {}
    }
}

impl StreamReceiver for JsonEncoder {
    fn start_record(&mut self, _id: &str) -> StreamResult<()> {
        self.stack.clear();
        self.stack.push(Frame {
            name: String::new(),
            value: Json::Object(Map::new()),
        });
        Ok(())
    }

    fn end_record(&mut self) -> StreamResult<()> {
        if self.stack.len() != 1 {
            return Err(StreamError::EntitiesNotBalanced);
        }
        if let Some(frame) = self.stack.pop() {
            self.records.push(frame.value);
        }
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> StreamResult<()> {
        if self.stack.is_empty() {
            return Err(StreamError::EntitiesNotBalanced);
        }
        let (name, value) = match name.strip_suffix(ARRAY_MARKER) {
            Some(stripped) => (stripped, Json::Array(Vec::new())),
            None => (name, Json::Object(Map::new())),
        };
        self.stack.push(Frame {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn end_entity(&mut self) -> StreamResult<()> {
        if self.stack.len() < 2 {
            return Err(StreamError::EntitiesNotBalanced);
        }
        if let Some(frame) = self.stack.pop() {
            insert(self.top()?, &frame.name, frame.value);
        }
        Ok(())
    }

    fn literal(&mut self, name: &str, value: &str) -> StreamResult<()> {
        insert(self.top()?, name, Json::String(value.to_string()));
        Ok(())
    }

    fn reset_stream(&mut self) -> StreamResult<()> {
        self.stack.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Event, EventCollector};
    use serde_json::json;

    #[test]
    fn test_decode_nested_object() {
        let input = json!({
            "id": 42,
            "title": "Ulysses",
            "author": {"name": "Joyce"},
            "tags": ["a", {"k": true}],
            "missing": null
        });

        let mut collector = EventCollector::new();
        JsonDecoder::new()
            .with_id_field("id")
            .decode(&input, &mut collector)
            .unwrap();

        assert_eq!(
            collector.into_events(),
            vec![
                Event::start_record("42"),
                Event::literal("id", "42"),
                Event::literal("title", "Ulysses"),
                Event::start_entity("author"),
                Event::literal("name", "Joyce"),
                Event::EndEntity,
                Event::start_entity("tags[]"),
                Event::literal("1", "a"),
                Event::start_entity("2"),
                Event::literal("k", "true"),
                Event::EndEntity,
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_decode_array_numbers_records() {
        let mut collector = EventCollector::new();
        JsonDecoder::new()
            .decode(&json!([{"a": "1"}, {"a": "2"}]), &mut collector)
            .unwrap();

        let ids: Vec<_> = collector
            .events()
            .iter()
            .filter_map(|e| match e {
                Event::StartRecord { id } => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_decode_rejects_scalars() {
        let mut collector = EventCollector::new();
        let err = JsonDecoder::new().decode(&json!([1]), &mut collector).unwrap_err();
        assert!(matches!(err, StreamError::InvalidInput(_)));
    }

    #[test]
    fn test_encode_events() {
        let mut encoder = JsonEncoder::new();
        encoder.start_record("1").unwrap();
        encoder.literal("name", "a").unwrap();
        encoder.literal("name", "b").unwrap();
        encoder.start_entity("tags[]").unwrap();
        encoder.literal("1", "x").unwrap();
        encoder.start_entity("2").unwrap();
        encoder.literal("k", "v").unwrap();
        encoder.end_entity().unwrap();
        encoder.end_entity().unwrap();
        encoder.start_entity("author").unwrap();
        encoder.literal("first", "James").unwrap();
        encoder.end_entity().unwrap();
        encoder.end_record().unwrap();

        assert_eq!(
            encoder.into_records(),
            vec![json!({
                "name": ["a", "b"],
                "tags": ["x", {"k": "v"}],
                "author": {"first": "James"}
            })]
        );
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let input = json!({"title": "T", "tags": ["a", "b"], "nested": {"x": "1"}});
        let mut encoder = JsonEncoder::new();
        JsonDecoder::new().decode(&input, &mut encoder).unwrap();
        assert_eq!(encoder.records(), &[input]);
    }

    #[test]
    fn test_encoder_unbalanced() {
        let mut encoder = JsonEncoder::new();
        encoder.start_record("1").unwrap();
        assert!(matches!(encoder.end_entity(), Err(StreamError::EntitiesNotBalanced)));

        encoder.start_entity("a").unwrap();
        assert!(matches!(encoder.end_record(), Err(StreamError::EntitiesNotBalanced)));
    }
}
