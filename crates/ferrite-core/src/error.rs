//! Unified error types for the Ferrite core.
//!
//! This module provides the standardized error taxonomy used across core
//! components. Provider-side errors are defined in ferrite-providers.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Gateway Errors
// =============================================================================

/// Errors that can occur on the persistent gateway connection.
///
/// Everything except [`GatewayError::AuthenticationRejected`] and
/// [`GatewayError::Shutdown`] is recovered internally via reconnect and never
/// surfaces to business logic.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The server did not send a hello frame in time.
    #[error("no hello frame within {0:?}")]
    HelloTimeout(Duration),

    /// An inbound frame could not be decoded.
    #[error("failed to decode frame: {reason}")]
    Decode {
        /// Reason for failure.
        reason: String,
    },

    /// The server rejected our credentials. Fatal, never retried.
    #[error("authentication rejected: {reason}")]
    AuthenticationRejected {
        /// Reason reported by the server, if any.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    Closed {
        /// Reason for closure.
        reason: String,
    },

    /// Frame send failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// The session was shut down by an explicit shutdown call.
    #[error("session shut down")]
    Shutdown,
}

impl GatewayError {
    /// Whether the session must stop reconnecting after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected { .. } | Self::Shutdown
        )
    }
}

// =============================================================================
// REST Errors
// =============================================================================

/// Errors that can occur on rate-limited REST calls.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// The server explicitly rejected the call as rate limited.
    ///
    /// The bucket has already been updated; the caller may retry after
    /// `retry_after`.
    #[error("rate limited on {route}, retry after {retry_after:?}")]
    RateLimited {
        /// Route key of the exhausted bucket.
        route: String,
        /// How long to wait before retrying.
        retry_after: Duration,
    },

    /// A server error persisted through the bounded retry loop.
    #[error("server error {status} after {attempts} attempts")]
    Server {
        /// HTTP status of the last attempt.
        status: u16,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The request failed below the HTTP layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected our credentials. Never retried.
    #[error("authentication rejected ({status})")]
    AuthenticationRejected {
        /// HTTP status (401 or 403).
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

// =============================================================================
// Listener Errors
// =============================================================================

/// The failure of a single listener invocation.
///
/// Never propagated to the emitter or to other listeners; routed to the
/// error-middleware phase and aggregate metrics only.
#[derive(Debug, Clone, Error)]
pub enum ListenerError {
    /// The handler returned an error.
    #[error("listener failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("listener panicked")]
    Panicked,

    /// The handler exceeded its per-listener timeout.
    #[error("listener timed out after {0:?}")]
    TimedOut(Duration),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;
