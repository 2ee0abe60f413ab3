//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FerriteConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gateway session settings.
    #[serde(default)]
    pub gateway: GatewaySection,

    /// REST client settings.
    #[serde(default)]
    pub rest: RestSection,

    /// Event dispatcher settings.
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    /// Provider orchestrator settings.
    #[serde(default)]
    pub providers: ProvidersSection,
}

impl FerriteConfig {
    /// Checks cross-field constraints the serde defaults cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.dispatcher.workers == 0 {
            return Err(ConfigError::validation("dispatcher.workers must be >= 1"));
        }
        if self.dispatcher.queue_capacity == 0 {
            return Err(ConfigError::validation(
                "dispatcher.queue_capacity must be >= 1",
            ));
        }
        if self.providers.failure_threshold == 0 {
            return Err(ConfigError::validation(
                "providers.failure_threshold must be >= 1",
            ));
        }
        if self.gateway.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "gateway.retry.backoff_multiplier must be >= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.gateway.retry.jitter) {
            return Err(ConfigError::validation(
                "gateway.retry.jitter must be within [0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log level names accepted in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a tracing level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line compact output (default).
    #[default]
    Compact,
    /// Default tracing formatter.
    Full,
    /// Multi-line human-friendly output.
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Write to stdout (default).
    #[default]
    Stdout,
    /// Write to stderr.
    Stderr,
    /// Write to the file named by `file_path`.
    File,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Include thread ids in output.
    #[serde(default)]
    pub thread_ids: bool,

    /// Per-module level overrides, e.g. `ferrite_gateway = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Gateway
// =============================================================================

/// Reconnect backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Initial delay between reconnect attempts in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between reconnect attempts in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Jitter fraction in [0, 1].
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.25
}

/// Gateway session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Gateway WebSocket URL.
    #[serde(default)]
    pub url: String,

    /// Authentication token.
    #[serde(default)]
    pub token: String,

    /// Capability bitmask sent in the identify payload.
    #[serde(default)]
    pub capabilities: u64,

    /// Shard index.
    #[serde(default)]
    pub shard_index: u32,

    /// Shard count.
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,

    /// Hello frame timeout in milliseconds.
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,

    /// Heartbeat grace in milliseconds added to the server interval.
    #[serde(default = "default_heartbeat_grace_ms")]
    pub heartbeat_grace_ms: u64,

    /// Maximum reconnect attempts (absent = infinite).
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Reconnect backoff settings.
    #[serde(default)]
    pub retry: RetrySection,

    /// Shutdown wait bound in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// REST path used for the initial identity lookup.
    #[serde(default = "default_identity_path")]
    pub identity_path: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            capabilities: 0,
            shard_index: 0,
            shard_count: default_shard_count(),
            hello_timeout_ms: default_hello_timeout_ms(),
            heartbeat_grace_ms: default_heartbeat_grace_ms(),
            max_retries: None,
            retry: RetrySection::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            identity_path: default_identity_path(),
        }
    }
}

impl GatewaySection {
    /// Converts to the gateway crate's config.
    pub fn to_gateway_config(&self) -> ferrite_gateway::GatewayConfig {
        ferrite_gateway::GatewayConfig {
            url: self.url.clone(),
            token: self.token.clone(),
            capabilities: self.capabilities,
            shard: (self.shard_index, self.shard_count.max(1)),
            hello_timeout: Duration::from_millis(self.hello_timeout_ms),
            heartbeat_grace: Duration::from_millis(self.heartbeat_grace_ms),
            max_retries: self.max_retries,
            backoff: ferrite_gateway::BackoffPolicy {
                initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                multiplier: self.retry.backoff_multiplier,
                jitter: self.retry.jitter,
            },
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            identity_path: self.identity_path.clone(),
        }
    }
}

fn default_shard_count() -> u32 {
    1
}

fn default_hello_timeout_ms() -> u64 {
    15000
}

fn default_heartbeat_grace_ms() -> u64 {
    5000
}

fn default_shutdown_timeout_ms() -> u64 {
    10000
}

fn default_identity_path() -> String {
    "/users/@me".to_string()
}

// =============================================================================
// REST
// =============================================================================

/// REST client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSection {
    /// Base URL prefixed to every request path.
    #[serde(default)]
    pub base_url: String,

    /// Optional bearer token. Falls back to the gateway token when absent.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_rest_timeout_ms")]
    pub timeout_ms: u64,

    /// Bounded retry count for server errors.
    #[serde(default = "default_server_error_retries")]
    pub server_error_retries: u32,

    /// Linear backoff step between server-error retries in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for RestSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_ms: default_rest_timeout_ms(),
            server_error_retries: default_server_error_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl RestSection {
    /// Converts to the gateway crate's REST config.
    pub fn to_rest_config(&self, gateway_token: &str) -> ferrite_gateway::RestConfig {
        let token = self
            .token
            .clone()
            .or_else(|| (!gateway_token.is_empty()).then(|| gateway_token.to_string()));
        ferrite_gateway::RestConfig {
            base_url: self.base_url.clone(),
            token,
            timeout: Duration::from_millis(self.timeout_ms),
            server_error_retries: self.server_error_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn default_rest_timeout_ms() -> u64 {
    30000
}

fn default_server_error_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Event dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSection {
    /// Capacity of the bounded event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of concurrent worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Default per-listener timeout in milliseconds.
    #[serde(default = "default_listener_timeout_ms")]
    pub listener_timeout_ms: u64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            listener_timeout_ms: default_listener_timeout_ms(),
        }
    }
}

impl DispatcherSection {
    /// Converts to the core crate's dispatcher config.
    pub fn to_dispatcher_config(&self) -> ferrite_core::DispatcherConfig {
        ferrite_core::DispatcherConfig {
            queue_capacity: self.queue_capacity,
            workers: self.workers,
            default_listener_timeout: Duration::from_millis(self.listener_timeout_ms),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_workers() -> usize {
    4
}

fn default_listener_timeout_ms() -> u64 {
    30000
}

// =============================================================================
// Providers
// =============================================================================

/// One remote completion provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSection {
    /// Identifier used in status reporting and logs.
    #[serde(default)]
    pub name: String,

    /// Completion endpoint URL.
    #[serde(default)]
    pub url: String,

    /// Health probe URL (defaults to `<url>/health`).
    #[serde(default)]
    pub health_url: Option<String>,

    /// Optional bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

impl ProviderSection {
    /// Converts to the providers crate's config.
    pub fn to_provider_config(&self, fallback_name: &str) -> ferrite_providers::ProviderConfig {
        let name = if self.name.is_empty() {
            fallback_name
        } else {
            &self.name
        };
        let mut config = ferrite_providers::ProviderConfig::new(name, self.url.clone());
        if let Some(health_url) = &self.health_url {
            config = config.with_health_url(health_url.clone());
        }
        if let Some(token) = &self.token {
            config = config.with_token(token.clone());
        }
        config
    }
}

/// Provider orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersSection {
    /// The preferred provider.
    #[serde(default)]
    pub primary: ProviderSection,

    /// The fallback provider.
    #[serde(default)]
    pub secondary: ProviderSection,

    /// Consecutive failures before a provider is marked unavailable.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            primary: ProviderSection::default(),
            secondary: ProviderSection::default(),
            failure_threshold: default_failure_threshold(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl ProvidersSection {
    /// Converts to the providers crate's orchestrator config.
    pub fn to_orchestrator_config(&self) -> ferrite_providers::OrchestratorConfig {
        ferrite_providers::OrchestratorConfig {
            failure_threshold: self.failure_threshold,
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_call_timeout_ms() -> u64 {
    30000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        FerriteConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = FerriteConfig::default();
        config.dispatcher.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_jitter_is_rejected() {
        let mut config = FerriteConfig::default();
        config.gateway.retry.jitter = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rest_token_falls_back_to_gateway_token() {
        let section = RestSection::default();
        let config = section.to_rest_config("bot-token");
        assert_eq!(config.token.as_deref(), Some("bot-token"));

        let mut section = RestSection::default();
        section.token = Some("rest-token".to_string());
        let config = section.to_rest_config("bot-token");
        assert_eq!(config.token.as_deref(), Some("rest-token"));
    }
}
