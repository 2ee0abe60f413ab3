//! Configuration for the provider orchestrator.

use std::time::Duration;

/// Connection settings for one remote completion provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Identifier used in status reporting and logs.
    pub name: String,
    /// Completion endpoint URL.
    pub url: String,
    /// Health probe URL.
    pub health_url: String,
    /// Optional bearer token.
    pub token: Option<String>,
}

impl ProviderConfig {
    /// Creates a config with the given name and endpoint URL.
    ///
    /// The health URL defaults to `<url>/health`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: name.into(),
            health_url: format!("{}/health", url.trim_end_matches('/')),
            url,
            token: None,
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets an explicit health probe URL.
    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = url.into();
        self
    }
}

/// Tuning knobs for the orchestrator.
///
/// Threshold and timeout are configuration rather than constants so they can
/// be tuned per deployment.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Consecutive failures after which a provider is marked unavailable.
    pub failure_threshold: u32,
    /// Timeout applied to each provider call (completions and probes).
    pub call_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}
