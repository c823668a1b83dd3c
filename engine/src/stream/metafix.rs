use std::path::Path;
use std::sync::Arc;

use super::StreamReceiver;
use crate::config::TransformOptions;
use crate::error::{StreamError, StreamResult};
use crate::fix::{Environment, Fix, FixRegistry, RecordTransformer};
use crate::path::{FieldMatcher, ARRAY_MARKER};
use crate::record::{Record, ID_FIELD};
use crate::value::{Array, Hash, Value};

/// One step from the record root down to an open entity.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(usize),
}

/// Mutable view of the container an event is folded into.
enum Container<'a> {
    Hash(&'a mut Hash),
    Array(&'a mut Array),
}

impl Container<'_> {
    /// Attach `value`; returns the steps from this container to it.
    fn attach(self, name: &str, value: Value) -> Vec<Step> {
        match self {
            Container::Hash(hash) => {
                let existed = hash.contains_field(name);
                hash.add(name, value);
                match hash.get(name) {
                    Some(Value::Array(array)) if existed => vec![
                        Step::Field(name.to_string()),
                        Step::Index(array.len().saturating_sub(1)),
                    ],
                    _ => vec![Step::Field(name.to_string())],
                }
            }
            Container::Array(array) => {
                array.add(value);
                vec![Step::Index(array.len().saturating_sub(1))]
            }
        }
    }
}

fn locate<'a>(fields: &'a mut Hash, steps: &[Step]) -> StreamResult<Container<'a>> {
    let mut current = Container::Hash(fields);
    for step in steps {
        let next = match (current, step) {
            (Container::Hash(hash), Step::Field(name)) => hash.get_mut(name),
            (Container::Array(array), Step::Index(index)) => array.get_mut(*index),
            _ => None,
        };
        current = match next {
            Some(Value::Hash(hash)) => Container::Hash(hash),
            Some(Value::Array(array)) => Container::Array(array),
            _ => return Err(StreamError::EntityNotFound(format!("{:?}", steps))),
        };
    }
    Ok(current)
}

/// Stream stage that runs a fix over every record.
///
/// Incoming events are folded into a [`Record`]: entities become hashes,
/// or arrays when their name ends in `[]`, and repeated names merge into
/// arrays. At `end_record` the fix runs and, unless the record was
/// rejected, the result is emitted to the downstream receiver.
pub struct Metafix<R> {
    receiver: R,
    fix: Fix,
    registry: Arc<FixRegistry>,
    env: Environment,
    options: TransformOptions,
    matcher: Arc<FieldMatcher>,
    record: Record,
    record_id: String,
    open_entities: Vec<Vec<Step>>,
}

impl<R: StreamReceiver> Metafix<R> {
    pub fn new(fix: Fix, receiver: R) -> Self {
        Self::with_options(fix, TransformOptions::default(), receiver)
    }

    pub fn with_options(fix: Fix, options: TransformOptions, receiver: R) -> Self {
        let matcher = Arc::new(FieldMatcher::new());
        Self {
            receiver,
            fix,
            registry: Arc::new(FixRegistry::new()),
            env: Environment::new(options.vars.clone()),
            options,
            record: Record::with_matcher(Arc::clone(&matcher)),
            matcher,
            record_id: String::new(),
            open_entities: Vec::new(),
        }
    }

    /// Use a custom command registry.
    pub fn with_registry(mut self, registry: Arc<FixRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Resolve includes and map files relative to `path`.
    pub fn with_fix_file(mut self, path: impl AsRef<Path>) -> Self {
        self.env = std::mem::take(&mut self.env).with_fix_file(path);
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The record being folded.
    pub fn current_record(&self) -> &Record {
        &self.record
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub fn into_receiver(self) -> R {
        self.receiver
    }

    fn new_value(name: &str) -> Value {
        if name.ends_with(ARRAY_MARKER) {
            Value::Array(Array::new())
        } else {
            Value::Hash(Hash::new())
        }
    }

    fn innermost(&mut self) -> StreamResult<Container<'_>> {
        let steps = self.open_entities.last().map(Vec::as_slice).unwrap_or(&[]);
        locate(self.record.fields_mut(), steps)
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn emit_record(&mut self) -> StreamResult<()> {
        self.receiver.start_record(&self.record_id)?;
        for (name, value) in self.record.fields() {
            emit(&mut self.receiver, &self.options, name, value)?;
        }
        self.receiver.end_record()
    }
}

/// Emit one field. Lists become entities with numbered members when their
/// name carries the `[]` marker or entity expansion is enabled, and bare
/// repeats of the field otherwise.
fn emit<R: StreamReceiver>(
    receiver: &mut R,
    options: &TransformOptions,
    name: &str,
    value: &Value,
) -> StreamResult<()> {
    match value {
        Value::String(s) => receiver.literal(name, s),
        Value::Hash(hash) => {
            receiver.start_entity(name)?;
            for (field, value) in hash {
                emit(receiver, options, field, value)?;
            }
            receiver.end_entity()
        }
        Value::Array(array) => {
            let marked = name.ends_with(ARRAY_MARKER);
            if !marked && !options.repeated_fields_to_entities {
                for item in array {
                    emit(receiver, options, name, item)?;
                }
                return Ok(());
            }
            if array.is_empty() && !marked {
                return Ok(());
            }

            receiver.start_entity(name)?;
            for (index, item) in array.iter().enumerate() {
                let member = options.member_name(index);
                match item {
                    Value::Array(_) => {
                        emit(receiver, options, &format!("{}{}", member, ARRAY_MARKER), item)?
                    }
                    _ => emit(receiver, options, &member, item)?,
                }
            }
            receiver.end_entity()
        }
    }
}

impl<R: StreamReceiver> StreamReceiver for Metafix<R> {
    fn start_record(&mut self, id: &str) -> StreamResult<()> {
        log::debug!("Start record: {}", id);
        self.record = Record::with_matcher(Arc::clone(&self.matcher));
        self.record.put_virtual_field(ID_FIELD, Value::from(id));
        self.record_id = id.to_string();
        self.open_entities.clear();
        Ok(())
    }

    fn end_record(&mut self) -> StreamResult<()> {
        if !self.open_entities.is_empty() {
            return Err(StreamError::EntitiesNotBalanced);
        }

        log::debug!("End record, walking fix: {}", self.record);
        let registry = Arc::clone(&self.registry);
        RecordTransformer::new(&registry, &mut self.env, self.options.strictness)
            .transform(&self.fix, &mut self.record)?;

        if self.record.is_rejected() {
            log::debug!("Record {} rejected", self.record_id);
            return Ok(());
        }

        log::debug!("Emitting record {}", self.record_id);
        self.emit_record()
    }

    fn start_entity(&mut self, name: &str) -> StreamResult<()> {
        let value = Self::new_value(name);
        let mut steps = self.open_entities.last().cloned().unwrap_or_default();
        let relative = self.innermost()?.attach(name, value);
        steps.extend(relative);
        self.open_entities.push(steps);
        Ok(())
    }

    fn end_entity(&mut self) -> StreamResult<()> {
        self.open_entities
            .pop()
            .map(|_| ())
            .ok_or(StreamError::EntitiesNotBalanced)
    }

    fn literal(&mut self, name: &str, value: &str) -> StreamResult<()> {
        self.innermost()?.attach(name, Value::from(value));
        Ok(())
    }

    fn reset_stream(&mut self) -> StreamResult<()> {
        self.record = Record::with_matcher(Arc::clone(&self.matcher));
        self.record_id.clear();
        self.open_entities.clear();
        self.receiver.reset_stream()
    }

    fn close_stream(&mut self) -> StreamResult<()> {
        log::debug!("Closing stream");
        self.env.close();
        self.receiver.close_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FixError;
    use crate::fix::{Expression, Strictness};
    use crate::stream::{Event, EventCollector};

    fn metafix(expressions: Vec<Expression>) -> Metafix<EventCollector> {
        Metafix::new(Fix::new(expressions), EventCollector::new())
    }

    fn events(metafix: Metafix<EventCollector>) -> Vec<Event> {
        metafix.into_receiver().into_events()
    }

    #[test]
    fn test_folds_repeated_literals_and_entities() {
        let mut mf = metafix(vec![]);
        mf.start_record("1").unwrap();
        mf.literal("name", "a").unwrap();
        mf.literal("name", "b").unwrap();
        mf.start_entity("author").unwrap();
        mf.literal("first", "James").unwrap();
        mf.end_entity().unwrap();
        mf.start_entity("author").unwrap();
        mf.literal("first", "Nora").unwrap();
        mf.end_entity().unwrap();

        let record = mf.current_record();
        assert_eq!(
            record.get("name").unwrap(),
            Some(Value::from(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(record.get("author.2.first").unwrap(), Some(Value::from("Nora")));
        assert_eq!(record.get("_id").unwrap(), Some(Value::from("1")));
    }

    #[test]
    fn test_marker_entity_is_list() {
        let mut mf = metafix(vec![]);
        mf.start_record("1").unwrap();
        mf.start_entity("tags[]").unwrap();
        mf.literal("1", "x").unwrap();
        mf.literal("2", "y").unwrap();
        mf.start_entity("3").unwrap();
        mf.literal("k", "v").unwrap();
        mf.end_entity().unwrap();
        mf.end_entity().unwrap();

        let record = mf.current_record();
        assert_eq!(record.get("tags[].2").unwrap(), Some(Value::from("y")));
        assert_eq!(record.get("tags[].3.k").unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_emits_transformed_record() {
        let mut mf = metafix(vec![
            Expression::call::<&str>("upcase", ["title"]),
            Expression::call("set_array", ["tags[]", "a", "b"]),
            Expression::call("add_field", ["author.name", "Joyce"]),
        ]);
        mf.start_record("7").unwrap();
        mf.literal("title", "ulysses").unwrap();
        mf.end_record().unwrap();

        assert_eq!(
            events(mf),
            vec![
                Event::start_record("7"),
                Event::literal("title", "ULYSSES"),
                Event::start_entity("tags[]"),
                Event::literal("1", "a"),
                Event::literal("2", "b"),
                Event::EndEntity,
                Event::start_entity("author"),
                Event::literal("name", "Joyce"),
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_repeated_fields_as_bare_repeats() {
        let options = TransformOptions {
            repeated_fields_to_entities: false,
            ..TransformOptions::default()
        };
        let mut mf = Metafix::with_options(Fix::default(), options, EventCollector::new());
        mf.start_record("1").unwrap();
        mf.literal("name", "a").unwrap();
        mf.literal("name", "b").unwrap();
        mf.end_record().unwrap();

        assert_eq!(
            events(mf),
            vec![
                Event::start_record("1"),
                Event::literal("name", "a"),
                Event::literal("name", "b"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_repeated_fields_as_entities_with_member_name() {
        let options = TransformOptions {
            entity_member_name: "*".to_string(),
            ..TransformOptions::default()
        };
        let mut mf = Metafix::with_options(Fix::default(), options, EventCollector::new());
        mf.start_record("1").unwrap();
        mf.literal("name", "a").unwrap();
        mf.literal("name", "b").unwrap();
        mf.end_record().unwrap();

        assert_eq!(
            events(mf),
            vec![
                Event::start_record("1"),
                Event::start_entity("name"),
                Event::literal("*", "a"),
                Event::literal("*", "b"),
                Event::EndEntity,
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_rejected_record_emits_nothing() {
        let mut mf = metafix(vec![Expression::call::<&str>("reject", [])]);
        mf.start_record("1").unwrap();
        mf.literal("a", "b").unwrap();
        mf.end_record().unwrap();
        assert!(events(mf).is_empty());
    }

    #[test]
    fn test_unbalanced_entities() {
        let mut mf = metafix(vec![]);
        mf.start_record("1").unwrap();
        mf.start_entity("a").unwrap();
        assert!(matches!(mf.end_record(), Err(StreamError::EntitiesNotBalanced)));

        let mut mf = metafix(vec![]);
        mf.start_record("1").unwrap();
        assert!(matches!(mf.end_entity(), Err(StreamError::EntitiesNotBalanced)));
    }

    #[test]
    fn test_strictness_record_skips_failing_record() {
        let options = TransformOptions::default().with_strictness(Strictness::Record);
        let fix = Fix::new(vec![Expression::call::<&str>("sum", ["n"])]);
        let mut mf = Metafix::with_options(fix, options, EventCollector::new());

        mf.start_record("1").unwrap();
        mf.literal("n", "1").unwrap();
        mf.literal("n", "x").unwrap();
        mf.end_record().unwrap();

        mf.start_record("2").unwrap();
        mf.literal("n", "1").unwrap();
        mf.literal("n", "2").unwrap();
        mf.end_record().unwrap();

        assert_eq!(
            events(mf),
            vec![
                Event::start_record("2"),
                Event::literal("n", "3"),
                Event::EndRecord,
            ]
        );
    }

    #[test]
    fn test_strictness_process_fails_stream() {
        let fix = Fix::new(vec![Expression::call::<&str>("sum", ["n"])]);
        let mut mf = Metafix::new(fix, EventCollector::new());
        mf.start_record("1").unwrap();
        mf.literal("n", "x").unwrap();
        mf.literal("n", "y").unwrap();

        let err = mf.end_record().unwrap_err();
        assert!(matches!(err, StreamError::Fix(FixError::Execution { .. })));
    }

    #[test]
    fn test_variables_from_options() {
        let options = TransformOptions::default().with_var("base", "http://example.org/");
        let fix = Fix::new(vec![Expression::call("prepend", ["id", "$[base]"])]);
        let mut mf = Metafix::with_options(fix, options, EventCollector::new());
        mf.start_record("1").unwrap();
        mf.literal("id", "42").unwrap();
        mf.end_record().unwrap();

        assert!(events(mf).contains(&Event::literal("id", "http://example.org/42")));
    }

    #[test]
    fn test_close_stream_forwards() {
        let mut mf = metafix(vec![]);
        mf.close_stream().unwrap();
        assert_eq!(events(mf), vec![Event::CloseStream]);
    }
}
