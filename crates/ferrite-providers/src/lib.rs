//! Completion provider orchestration for the Ferrite bot runtime.
//!
//! Business logic calls [`Orchestrator::execute`] with a structured request
//! and always gets a [`Completion`] back: the primary provider first, the
//! secondary on failure, and a locally synthesized answer when both are
//! exhausted. Repeated consecutive failures trip a circuit breaker per
//! provider; an explicit [`Orchestrator::probe`] restores it.

mod config;
mod endpoint;
mod orchestrator;
mod status;
mod types;

pub use config::{OrchestratorConfig, ProviderConfig};
pub use endpoint::{CompletionProvider, HttpProvider};
pub use orchestrator::{FallbackResponder, Orchestrator, ProviderRole};
pub use status::ProviderStatus;
pub use types::{Completion, CompletionRequest, ProviderError, ProviderResult, ResultSource};
