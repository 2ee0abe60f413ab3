//! The event envelope carried through the dispatcher.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

/// An immutable event flowing through the dispatch pipeline.
///
/// Events are created on emit and destroyed after every listener for their
/// name has run and post-middleware has completed. Cloning is cheap: the
/// argument tuple is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Event {
    id: Uuid,
    name: Arc<str>,
    args: Arc<[Value]>,
    enqueued_at: Instant,
}

impl Event {
    /// Creates a new event with a generated id and the current timestamp.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().into(),
            args: args.into(),
            enqueued_at: Instant::now(),
        }
    }

    /// Returns the generated event id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the event name this event is dispatched under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordered argument tuple.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Returns the instant this event was enqueued.
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_get_distinct_ids() {
        let a = Event::new("ready", vec![]);
        let b = Event::new("ready", vec![]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn args_are_ordered() {
        let event = Event::new("msg", vec![json!("hello"), json!(42)]);
        assert_eq!(event.arg(0), Some(&json!("hello")));
        assert_eq!(event.arg(1), Some(&json!(42)));
        assert_eq!(event.arg(2), None);
    }
}
