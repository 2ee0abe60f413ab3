//! Provider orchestration: primary, secondary, local fallback.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::endpoint::CompletionProvider;
use crate::status::ProviderStatus;
use crate::types::{Completion, CompletionRequest, ProviderError, ResultSource};

/// Which provider a caller-driven recovery loop wants to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRole {
    /// The preferred provider.
    Primary,
    /// The fallback provider.
    Secondary,
}

/// Synthesizes a local answer when both providers are exhausted.
pub type FallbackResponder = Arc<dyn Fn(&CompletionRequest) -> String + Send + Sync>;

fn default_fallback(_request: &CompletionRequest) -> String {
    "I can't reach my language services right now; please try again in a moment.".to_string()
}

/// One provider plus its availability bookkeeping.
struct ProviderSlot {
    provider: Arc<dyn CompletionProvider>,
    status: Mutex<ProviderStatus>,
}

impl ProviderSlot {
    fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        let status = Mutex::new(ProviderStatus::new(provider.id()));
        Self { provider, status }
    }

    fn is_available(&self) -> bool {
        self.status.lock().available
    }
}

/// Executes completion requests against a primary provider, transparently
/// falling back to a secondary on failure, with circuit breaking to avoid
/// repeatedly calling a provider that is known-down.
///
/// Callers always receive a [`Completion`]; when both providers are
/// exhausted the answer is synthesized locally and tagged
/// [`ResultSource::Fallback`].
pub struct Orchestrator {
    primary: ProviderSlot,
    secondary: ProviderSlot,
    config: OrchestratorConfig,
    fallback: FallbackResponder,
}

impl Orchestrator {
    /// Creates an orchestrator over the two providers.
    pub fn new(
        primary: Arc<dyn CompletionProvider>,
        secondary: Arc<dyn CompletionProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            primary: ProviderSlot::new(primary),
            secondary: ProviderSlot::new(secondary),
            config,
            fallback: Arc::new(default_fallback),
        }
    }

    /// Replaces the local fallback responder.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Executes one request through the fallback chain.
    pub async fn execute(&self, request: &CompletionRequest) -> Completion {
        for (slot, source) in [
            (&self.primary, ResultSource::Primary),
            (&self.secondary, ResultSource::Secondary),
        ] {
            if !slot.is_available() {
                debug!(provider = %slot.provider.id(), "Skipping unavailable provider");
                continue;
            }
            match self.attempt(slot, request).await {
                Ok(text) => return Completion { text, source },
                Err(error) => {
                    warn!(provider = %slot.provider.id(), error = %error, "Provider call failed");
                }
            }
        }

        debug!("All providers exhausted, synthesizing local fallback");
        Completion {
            text: (self.fallback)(request),
            source: ResultSource::Fallback,
        }
    }

    /// Probes one provider and restores its availability on success.
    ///
    /// Never invoked inside [`Orchestrator::execute`]; offered to a
    /// caller-driven recovery loop.
    pub async fn probe(&self, role: ProviderRole) -> bool {
        let slot = self.slot(role);
        let healthy = matches!(
            timeout(self.config.call_timeout, slot.provider.probe()).await,
            Ok(Ok(()))
        );
        if healthy {
            let mut status = slot.status.lock();
            if !status.available {
                info!(provider = %status.id, "Health probe succeeded, provider restored");
            }
            status.mark_available();
        }
        healthy
    }

    /// Returns the status snapshot for one provider.
    pub fn status(&self, role: ProviderRole) -> ProviderStatus {
        self.slot(role).status.lock().clone()
    }

    fn slot(&self, role: ProviderRole) -> &ProviderSlot {
        match role {
            ProviderRole::Primary => &self.primary,
            ProviderRole::Secondary => &self.secondary,
        }
    }

    /// One timed provider call with success/failure bookkeeping.
    async fn attempt(
        &self,
        slot: &ProviderSlot,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let outcome = match timeout(self.config.call_timeout, slot.provider.complete(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.call_timeout)),
        };

        match &outcome {
            Ok(_) => slot.status.lock().record_success(),
            Err(error) => {
                let tripped = slot
                    .status
                    .lock()
                    .record_failure(error.to_string(), self.config.failure_threshold);
                if tripped {
                    warn!(
                        provider = %slot.provider.id(),
                        threshold = self.config.failure_threshold,
                        "Provider marked unavailable"
                    );
                }
            }
        }
        outcome
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("primary", &self.status(ProviderRole::Primary))
            .field("secondary", &self.status(ProviderRole::Secondary))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted provider: fails while `failing` is set, counts calls.
    struct ScriptedProvider {
        id: String,
        failing: AtomicBool,
        calls: AtomicUsize,
        probes: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(id: &str, failing: bool) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                failing: AtomicBool::new(failing),
                calls: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(ProviderError::Status { status: 500 })
            } else {
                Ok(format!("answer from {}", self.id))
            }
        }

        async fn probe(&self) -> Result<(), ProviderError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(ProviderError::Status { status: 500 })
            } else {
                Ok(())
            }
        }
    }

    fn config(threshold: u32) -> OrchestratorConfig {
        OrchestratorConfig {
            failure_threshold: threshold,
            call_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn healthy_primary_answers() {
        let primary = ScriptedProvider::new("primary", false);
        let secondary = ScriptedProvider::new("secondary", false);
        let orchestrator = Orchestrator::new(primary.clone(), secondary.clone(), config(3));

        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Primary);
        assert_eq!(completion.text, "answer from primary");
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn failed_primary_falls_back_to_secondary() {
        let primary = ScriptedProvider::new("primary", true);
        let secondary = ScriptedProvider::new("secondary", false);
        let orchestrator = Orchestrator::new(primary.clone(), secondary.clone(), config(3));

        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Secondary);
        assert_eq!(orchestrator.status(ProviderRole::Primary).consecutive_errors, 1);
        assert!(orchestrator.status(ProviderRole::Primary).available);
    }

    #[tokio::test]
    async fn breaker_skips_primary_after_threshold() {
        let primary = ScriptedProvider::new("primary", true);
        let secondary = ScriptedProvider::new("secondary", false);
        let orchestrator = Orchestrator::new(primary.clone(), secondary.clone(), config(3));

        for _ in 0..3 {
            orchestrator.execute(&CompletionRequest::new("hi")).await;
        }
        assert!(!orchestrator.status(ProviderRole::Primary).available);
        assert_eq!(primary.calls(), 3);

        // Fourth request goes straight to the secondary.
        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Secondary);
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_chain_synthesizes_fallback() {
        let primary = ScriptedProvider::new("primary", true);
        let secondary = ScriptedProvider::new("secondary", true);
        let orchestrator = Orchestrator::new(primary, secondary, config(3))
            .with_fallback(|request| format!("local answer to: {}", request.prompt));

        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Fallback);
        assert_eq!(completion.text, "local answer to: hi");
    }

    #[tokio::test]
    async fn success_resets_consecutive_errors() {
        let primary = ScriptedProvider::new("primary", true);
        let secondary = ScriptedProvider::new("secondary", false);
        let orchestrator = Orchestrator::new(primary.clone(), secondary, config(3));

        orchestrator.execute(&CompletionRequest::new("hi")).await;
        orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(orchestrator.status(ProviderRole::Primary).consecutive_errors, 2);

        primary.set_failing(false);
        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Primary);
        assert_eq!(orchestrator.status(ProviderRole::Primary).consecutive_errors, 0);
    }

    #[tokio::test]
    async fn probe_restores_a_tripped_provider() {
        let primary = ScriptedProvider::new("primary", true);
        let secondary = ScriptedProvider::new("secondary", false);
        let orchestrator = Orchestrator::new(primary.clone(), secondary, config(2));

        orchestrator.execute(&CompletionRequest::new("hi")).await;
        orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert!(!orchestrator.status(ProviderRole::Primary).available);

        // Probe fails while the provider is still down.
        assert!(!orchestrator.probe(ProviderRole::Primary).await);
        assert!(!orchestrator.status(ProviderRole::Primary).available);

        // Provider recovers; probe flips it back.
        primary.set_failing(false);
        assert!(orchestrator.probe(ProviderRole::Primary).await);
        assert!(orchestrator.status(ProviderRole::Primary).available);

        let completion = orchestrator.execute(&CompletionRequest::new("hi")).await;
        assert_eq!(completion.source, ResultSource::Primary);
    }
}
