//! Middleware phases for cross-cutting interception.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::ListenerError;
use crate::event::Event;

use super::listener::{HandlerError, ListenerId, MiddlewareId};

/// The phase a middleware runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewarePhase {
    /// Runs before any listener for the event.
    Pre,
    /// Runs after all listeners have completed, regardless of individual
    /// failures.
    Post,
    /// Runs once per listener failure, with that listener's error and the
    /// original event.
    Error,
}

/// Context handed to a middleware invocation.
#[derive(Clone)]
pub struct MiddlewareContext {
    /// The event being processed (original arguments included).
    pub event: Event,
    /// The failing listener, for [`MiddlewarePhase::Error`] only.
    pub listener: Option<ListenerId>,
    /// The listener's failure, for [`MiddlewarePhase::Error`] only.
    pub error: Option<ListenerError>,
}

impl MiddlewareContext {
    pub(crate) fn for_event(event: Event) -> Self {
        Self {
            event,
            listener: None,
            error: None,
        }
    }

    pub(crate) fn for_failure(event: Event, listener: ListenerId, error: ListenerError) -> Self {
        Self {
            event,
            listener: Some(listener),
            error: Some(error),
        }
    }
}

impl std::fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("event", &self.event.name())
            .field("listener", &self.listener)
            .field("error", &self.error)
            .finish()
    }
}

/// The future returned by a middleware invocation.
pub type MiddlewareFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A registered middleware callable.
pub type Middleware = Arc<dyn Fn(MiddlewareContext) -> MiddlewareFuture + Send + Sync>;

/// A middleware registration.
#[derive(Clone)]
pub(crate) struct MiddlewareEntry {
    pub(crate) id: MiddlewareId,
    pub(crate) middleware: Middleware,
}
