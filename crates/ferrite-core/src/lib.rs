//! Core event pipeline for the Ferrite bot runtime.
//!
//! This crate provides the pieces shared by every other Ferrite crate:
//!
//! - [`Event`] — the immutable envelope flowing through the pipeline
//! - [`Dispatcher`] — concurrent fan-out with filters, middleware, and
//!   per-listener failure isolation
//! - The error taxonomy ([`GatewayError`], [`RestError`], [`ListenerError`])
//!
//! Nothing here owns a network connection; the gateway and REST transports
//! live in `ferrite-gateway`, provider fallback in `ferrite-providers`, and
//! configuration/wiring in `ferrite-runtime`.

mod dispatch;
mod error;
mod event;

pub use dispatch::{
    Dispatcher, DispatcherConfig, EventHandler, Handler, HandlerError, HandlerFuture, ListenerId,
    ListenerOptions, MetricsSnapshot, Middleware, MiddlewareContext, MiddlewareFuture,
    MiddlewarePhase, MiddlewareId, Predicate,
};
pub use error::{GatewayError, GatewayResult, ListenerError, RestError, RestResult};
pub use event::Event;
