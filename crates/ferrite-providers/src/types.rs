//! Request, completion, and error types for provider calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured completion request.
///
/// Prompt content and its semantics belong to the business-logic layer; this
/// core only moves the structure to a provider and returns what comes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The prompt text.
    pub prompt: String,
    /// Optional upper bound on the completion length, in provider units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Creates a request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
        }
    }

    /// Sets the completion length bound.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Which path produced a completion.
///
/// Total provider exhaustion is deliberately distinguishable: a
/// [`ResultSource::Fallback`] completion is a synthesized local answer, and
/// observability hooks can treat it as degraded service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// The primary provider answered.
    Primary,
    /// The secondary provider answered after the primary failed or was
    /// unavailable.
    Secondary,
    /// Both providers were exhausted; the answer is synthesized locally.
    Fallback,
}

/// The result of [`Orchestrator::execute`](crate::Orchestrator::execute).
///
/// Callers always receive a completion; transport trouble never propagates
/// past the orchestrator.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The completion text.
    pub text: String,
    /// Which path produced it.
    pub source: ResultSource,
}

/// Errors from a single provider call.
///
/// Absorbed by the orchestrator's fallback chain; surfaced only through
/// status bookkeeping and logs.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request failed below the HTTP layer.
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The call exceeded the configured timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be decoded.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;
