//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gateway session failed fatally.
    #[error(transparent)]
    Gateway(#[from] ferrite_core::GatewayError),

    /// REST client construction or a call failed.
    #[error(transparent)]
    Rest(#[from] ferrite_core::RestError),

    /// Shutdown signal handling failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
