//! Configuration types for the gateway session and the REST client.

use std::time::Duration;

/// Reconnect backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Cap applied to the growing delay.
    pub max_delay: Duration,
    /// Multiplier applied per failed attempt.
    pub multiplier: f64,
    /// Fraction of the delay randomized away (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

/// Configuration for the gateway session.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway WebSocket URL.
    pub url: String,
    /// Authentication token sent in the identify payload.
    pub token: String,
    /// Capability bitmask sent in the identify payload.
    pub capabilities: u64,
    /// Shard descriptor (index, total).
    pub shard: (u32, u32),
    /// How long to wait for the hello frame after the socket opens.
    pub hello_timeout: Duration,
    /// Grace added to the heartbeat interval before the session is
    /// considered zombied.
    pub heartbeat_grace: Duration,
    /// Maximum number of reconnect attempts (None = infinite).
    pub max_retries: Option<u32>,
    /// Reconnect backoff policy.
    pub backoff: BackoffPolicy,
    /// How long shutdown waits for the session task to finish.
    pub shutdown_timeout: Duration,
    /// REST path used for the initial identity lookup.
    pub identity_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            capabilities: 0,
            shard: (0, 1),
            hello_timeout: Duration::from_secs(15),
            heartbeat_grace: Duration::from_secs(5),
            max_retries: None,
            backoff: BackoffPolicy::default(),
            shutdown_timeout: Duration::from_secs(10),
            identity_path: "/users/@me".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Creates a config with the given URL and token.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Sets the capability bitmask.
    pub fn with_capabilities(mut self, capabilities: u64) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the shard descriptor.
    pub fn with_shard(mut self, index: u32, total: u32) -> Self {
        self.shard = (index, total);
        self
    }

    /// Sets the maximum reconnect attempts.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}

/// Configuration for the rate-limited REST client.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL prefixed to every request path.
    pub base_url: String,
    /// Optional bearer token.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Bounded retry count for server errors.
    pub server_error_retries: u32,
    /// Linear backoff step between server-error retries.
    pub retry_backoff: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout: Duration::from_secs(30),
            server_error_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl RestConfig {
    /// Creates a config with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
