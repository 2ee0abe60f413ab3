//! The concurrent, filterable, middleware-augmented event pipeline.
//!
//! - [`Dispatcher`] — bounded queue, worker pool, fan-out with per-listener
//!   failure isolation
//! - [`ListenerOptions`] — priority, one-shot, predicate, timeout
//! - [`MiddlewarePhase`] — pre / post / error interception
//! - [`MetricsSnapshot`] — per-event-name aggregate counters

mod dispatcher;
mod listener;
mod metrics;
mod middleware;
mod registry;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use listener::{
    EventHandler, Handler, HandlerError, HandlerFuture, ListenerId, ListenerOptions, MiddlewareId,
    Predicate,
};
pub use metrics::MetricsSnapshot;
pub use middleware::{Middleware, MiddlewareContext, MiddlewareFuture, MiddlewarePhase};
