//! Event streams.
//!
//! Records travel between stages as a flat sequence of events:
//!
//! ```text
//! start_record("1")
//!   literal("title", "Ulysses")
//!   start_entity("author[]")
//!     literal("1", "Joyce")
//!   end_entity()
//! end_record()
//! ```
//!
//! - [`StreamReceiver`] - Anything that consumes events
//! - [`Metafix`] - Folds events into a record, runs a fix, emits the result
//! - [`EventCollector`] - Records events for inspection
//! - [`json`] - JSON decoder and encoder

pub mod json;
mod metafix;

use serde::{Deserialize, Serialize};

use crate::error::StreamResult;

pub use json::{JsonDecoder, JsonEncoder};
pub use metafix::Metafix;

/// Consumer of an event stream.
pub trait StreamReceiver {
    fn start_record(&mut self, id: &str) -> StreamResult<()>;

    fn end_record(&mut self) -> StreamResult<()>;

    fn start_entity(&mut self, name: &str) -> StreamResult<()>;

    fn end_entity(&mut self) -> StreamResult<()>;

    fn literal(&mut self, name: &str, value: &str) -> StreamResult<()>;

    /// Discard any partial state.
    fn reset_stream(&mut self) -> StreamResult<()> {
        Ok(())
    }

    /// End of input. Release resources.
    fn close_stream(&mut self) -> StreamResult<()> {
        Ok(())
    }
}

impl<R: StreamReceiver + ?Sized> StreamReceiver for &mut R {
    fn start_record(&mut self, id: &str) -> StreamResult<()> {
        (**self).start_record(id)
    }

    fn end_record(&mut self) -> StreamResult<()> {
        (**self).end_record()
    }

    fn start_entity(&mut self, name: &str) -> StreamResult<()> {
        (**self).start_entity(name)
    }

    fn end_entity(&mut self) -> StreamResult<()> {
        (**self).end_entity()
    }

    fn literal(&mut self, name: &str, value: &str) -> StreamResult<()> {
        (**self).literal(name, value)
    }

    fn reset_stream(&mut self) -> StreamResult<()> {
        (**self).reset_stream()
    }

    fn close_stream(&mut self) -> StreamResult<()> {
        (**self).close_stream()
    }
}

/// One event of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    StartRecord { id: String },
    EndRecord,
    StartEntity { name: String },
    EndEntity,
    Literal { name: String, value: String },
    ResetStream,
    CloseStream,
}

impl Event {
    pub fn start_record(id: impl Into<String>) -> Self {
        Event::StartRecord { id: id.into() }
    }

    pub fn start_entity(name: impl Into<String>) -> Self {
        Event::StartEntity { name: name.into() }
    }

    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Event::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Send this event to `receiver`.
    pub fn replay<R: StreamReceiver + ?Sized>(&self, receiver: &mut R) -> StreamResult<()> {
        match self {
            Event::StartRecord { id } => receiver.start_record(id),
            Event::EndRecord => receiver.end_record(),
            Event::StartEntity { name } => receiver.start_entity(name),
            Event::EndEntity => receiver.end_entity(),
            Event::Literal { name, value } => receiver.literal(name, value),
            Event::ResetStream => receiver.reset_stream(),
            Event::CloseStream => receiver.close_stream(),
        }
    }
}

/// Send every event in order.
pub fn replay_all<'e, R>(events: impl IntoIterator<Item = &'e Event>, receiver: &mut R) -> StreamResult<()>
where
    R: StreamReceiver + ?Sized,
{
    for event in events {
        event.replay(receiver)?;
    }
    Ok(())
}

/// Receiver that keeps every event it is sent.
#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Vec<Event>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl StreamReceiver for EventCollector {
    fn start_record(&mut self, id: &str) -> StreamResult<()> {
        self.events.push(Event::start_record(id));
        Ok(())
    }

    fn end_record(&mut self) -> StreamResult<()> {
        self.events.push(Event::EndRecord);
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> StreamResult<()> {
        self.events.push(Event::start_entity(name));
        Ok(())
    }

    fn end_entity(&mut self) -> StreamResult<()> {
        self.events.push(Event::EndEntity);
        Ok(())
    }

    fn literal(&mut self, name: &str, value: &str) -> StreamResult<()> {
        self.events.push(Event::literal(name, value));
        Ok(())
    }

    fn reset_stream(&mut self) -> StreamResult<()> {
        self.events.push(Event::ResetStream);
        Ok(())
    }

    fn close_stream(&mut self) -> StreamResult<()> {
        self.events.push(Event::CloseStream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_through_mut_ref() {
        let events = vec![
            Event::start_record("1"),
            Event::literal("a", "b"),
            Event::EndRecord,
        ];

        let mut collector = EventCollector::new();
        replay_all(&events, &mut &mut collector).unwrap();
        assert_eq!(collector.events(), events.as_slice());
    }

    #[test]
    fn test_event_serde() {
        let json = serde_json::to_string(&Event::literal("a", "b")).unwrap();
        assert_eq!(json, r#"{"event":"literal","name":"a","value":"b"}"#);

        let event: Event = serde_json::from_str(r#"{"event":"end_entity"}"#).unwrap();
        assert_eq!(event, Event::EndEntity);
    }
}
