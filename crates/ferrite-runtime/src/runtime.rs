//! Main runtime orchestration.
//!
//! The runtime owns one of each core component — dispatcher, REST client,
//! provider orchestrator, and (once connected) the gateway session — wired
//! together from a [`FerriteConfig`]. No singletons: collaborators receive
//! the components by `Arc`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ferrite_runtime::FerriteRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Auto-loads ferrite.toml / FERRITE_* env
//!     let runtime = FerriteRuntime::new()?;
//!
//!     runtime.dispatcher().on("message_create", |event| async move {
//!         println!("{:?}", event.args());
//!         Ok(())
//!     }, Default::default());
//!
//!     // Connects the gateway and runs until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use ferrite_core::Dispatcher;
use ferrite_gateway::{RestClient, SessionHandle, SessionState};
use ferrite_providers::{HttpProvider, Orchestrator};

use crate::config::{ConfigLoader, FerriteConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The Ferrite runtime: one dispatcher, one REST client, one orchestrator,
/// one gateway session.
pub struct FerriteRuntime {
    config: FerriteConfig,
    dispatcher: Arc<Dispatcher>,
    rest: Arc<RestClient>,
    orchestrator: Arc<Orchestrator>,
    session: RwLock<Option<SessionHandle>>,
}

impl FerriteRuntime {
    /// Creates a runtime with automatic configuration loading.
    ///
    /// Searches the default locations for `ferrite.toml`, applies
    /// `FERRITE_*` environment overrides, and initializes logging from the
    /// result. Must be called from within a tokio runtime (the dispatcher
    /// spawns its worker pool on construction).
    pub fn new() -> RuntimeResult<Self> {
        let config = ConfigLoader::new().load()?;
        Self::from_config(config)
    }

    /// Creates a runtime from a pre-loaded configuration.
    pub fn from_config(config: FerriteConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let dispatcher = Arc::new(Dispatcher::new(config.dispatcher.to_dispatcher_config()));
        let rest = Arc::new(RestClient::new(
            config.rest.to_rest_config(&config.gateway.token),
        )?);

        let orchestrator_config = config.providers.to_orchestrator_config();
        let primary = HttpProvider::new(config.providers.primary.to_provider_config("primary"));
        let secondary =
            HttpProvider::new(config.providers.secondary.to_provider_config("secondary"));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(primary),
            Arc::new(secondary),
            orchestrator_config,
        ));

        Ok(Self {
            config,
            dispatcher,
            rest,
            orchestrator,
            session: RwLock::new(None),
        })
    }

    /// Returns the event dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns the REST client.
    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    /// Returns the provider orchestrator.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &FerriteConfig {
        &self.config
    }

    /// Returns the gateway session state, if a session exists.
    pub async fn session_state(&self) -> Option<SessionState> {
        self.session.read().await.as_ref().map(|s| s.state())
    }

    /// Opens the gateway session.
    ///
    /// An existing session is shut down first; at most one live transport
    /// per runtime.
    pub async fn connect(&self) -> RuntimeResult<()> {
        if self.config.gateway.url.is_empty() {
            return Err(RuntimeError::Config(
                crate::config::ConfigError::validation("gateway.url is required to connect"),
            ));
        }

        let mut session = self.session.write().await;
        if let Some(previous) = session.take() {
            warn!("Replacing existing gateway session");
            let _ = previous.shutdown().await;
        }

        let sink: Arc<dyn ferrite_gateway::EventSink> = self.dispatcher.clone();
        let handle = ferrite_gateway::connect(
            self.config.gateway.to_gateway_config(),
            sink,
            Some(Arc::clone(&self.rest)),
        )
        .await?;
        *session = Some(handle);
        info!("Gateway session started");
        Ok(())
    }

    /// Connects and runs until Ctrl+C, then shuts down in order.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.connect().await?;

        info!("Ferrite runtime running, press Ctrl+C to stop");
        signal::ctrl_c()
            .await
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;
        info!("Shutdown signal received");

        self.shutdown().await
    }

    /// Stops the gateway session first, then drains the dispatcher.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        if let Some(session) = self.session.write().await.take() {
            session.shutdown().await?;
        }
        self.dispatcher.shutdown().await;
        info!("Ferrite runtime stopped");
        Ok(())
    }
}

impl std::fmt::Debug for FerriteRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FerriteRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("rest", &self.rest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_core::ListenerOptions;

    #[tokio::test]
    async fn runtime_wires_components_from_defaults() {
        let runtime = FerriteRuntime::from_config(FerriteConfig::default()).unwrap();

        assert!(runtime.dispatcher().emit("ready", vec![]));
        assert_eq!(runtime.session_state().await, None);
        assert_eq!(runtime.rest().bucket_count(), 0);
    }

    #[tokio::test]
    async fn connect_without_url_is_a_config_error() {
        let runtime = FerriteRuntime::from_config(FerriteConfig::default()).unwrap();
        assert!(matches!(
            runtime.connect().await,
            Err(RuntimeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_is_clean_without_a_session() {
        let runtime = FerriteRuntime::from_config(FerriteConfig::default()).unwrap();
        runtime
            .dispatcher()
            .on("msg", |_event| async { Ok(()) }, ListenerOptions::new());

        runtime.shutdown().await.unwrap();
        assert!(!runtime.dispatcher().emit("msg", vec![]));
    }
}
