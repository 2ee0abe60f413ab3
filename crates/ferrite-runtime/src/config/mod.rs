//! Configuration module for the Ferrite runtime.
//!
//! TOML files, `FERRITE_*` environment variables, and programmatic overrides
//! are layered through figment into one [`FerriteConfig`].

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    DispatcherSection, FerriteConfig, GatewaySection, LogFormat, LogLevel, LogOutput,
    LoggingConfig, ProviderSection, ProvidersSection, RestSection, RetrySection,
};
