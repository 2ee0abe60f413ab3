//! Listener registration types.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::event::Event;

/// Error type produced by a handler invocation.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The future returned by a handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A registered handler: an explicit closure taking the event by value.
///
/// Handlers receive a clone of the event (cheap, arguments are shared) so the
/// returned future is `'static` and can be spawned into its own task.
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// A predicate evaluated against an event before a listener runs.
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Identifier of a registered listener, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Identifier of a registered middleware, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareId(pub(crate) u64);

/// An object-safe event handler, for consumers that prefer an interface
/// object over a closure.
///
/// Adapted into a [`Handler`] by `Dispatcher::on_handler`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}

/// Options controlling how a listener is invoked.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    /// Invocation priority. Lower runs first; registration order breaks ties.
    pub priority: i32,
    /// Remove the listener after its first invocation.
    pub once: bool,
    /// Per-listener execution timeout. `None` falls back to the dispatcher
    /// default.
    pub timeout: Option<Duration>,
    /// Per-listener predicate. The listener is skipped (not failed) when it
    /// returns false.
    pub filter: Option<Predicate>,
}

impl ListenerOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the listener one-shot.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Sets the per-listener timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the per-listener predicate.
    pub fn filter(mut self, filter: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl std::fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("timeout", &self.timeout)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

/// A registered listener entry.
///
/// Owned exclusively by the registry for its event name; destroyed on
/// explicit removal or after firing once if one-shot.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    /// Registration sequence, used to break priority ties (stable order).
    pub(crate) seq: u64,
    pub(crate) priority: i32,
    pub(crate) once: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) filter: Option<Predicate>,
    pub(crate) handler: Handler,
}
