//! Ferrite Runtime - wiring layer for the Ferrite bot runtime.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `FerriteConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Component wiring and lifecycle (`FerriteRuntime`)
//!
//! ```ignore
//! use ferrite_runtime::FerriteRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = FerriteRuntime::new()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, FerriteConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::FerriteRuntime;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
