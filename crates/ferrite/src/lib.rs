//! Networking and event-orchestration core for a chat-platform bot runtime.
//!
//! Ferrite maintains one persistent, resumable gateway session, issues
//! rate-limited REST calls, fans inbound and synthetic events out through a
//! concurrent middleware-augmented dispatcher, and orchestrates completion
//! providers with fallback and circuit breaking.
//!
//! This facade re-exports the public surface of the component crates:
//!
//! - [`ferrite_core`] — events, errors, the dispatcher
//! - [`ferrite_gateway`] — the gateway session and REST client
//! - [`ferrite_providers`] — the provider orchestrator
//! - [`ferrite_runtime`] — configuration, logging, and wiring

pub use ferrite_core::{
    Dispatcher, DispatcherConfig, Event, EventHandler, GatewayError, GatewayResult, HandlerError,
    ListenerError, ListenerId, ListenerOptions, MetricsSnapshot, MiddlewareContext, MiddlewareId,
    MiddlewarePhase, RestError, RestResult,
};
pub use ferrite_gateway::{
    BackoffPolicy, DispatchEvent, EventSink, GatewayConfig, Method, RestClient, RestConfig,
    SessionHandle, SessionState, connect,
};
pub use ferrite_providers::{
    Completion, CompletionProvider, CompletionRequest, HttpProvider, Orchestrator,
    OrchestratorConfig, ProviderConfig, ProviderError, ProviderRole, ProviderStatus, ResultSource,
};
pub use ferrite_runtime::{ConfigLoader, FerriteConfig, FerriteRuntime, RuntimeError};

/// Runtime module with config/logging/wiring specifics.
pub mod runtime {
    pub use ferrite_runtime::*;
}
