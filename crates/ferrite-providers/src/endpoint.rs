//! The provider seam and its HTTP implementation.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::types::{CompletionRequest, ProviderError, ProviderResult};

/// A remote completion provider.
///
/// The orchestrator only knows this seam; the HTTP implementation below is
/// the production one, and tests substitute scripted fakes.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Identifier used in status reporting and logs.
    fn id(&self) -> &str;

    /// Executes one completion request.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String>;

    /// Lightweight health check, used by caller-driven recovery loops.
    async fn probe(&self) -> ProviderResult<()>;
}

/// A provider reached over HTTP with a JSON request/response body.
pub struct HttpProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Creates a provider with a fresh HTTP client.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Creates a provider sharing an existing HTTP client.
    pub fn with_client(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpProvider {
    fn id(&self) -> &str {
        &self.config.name
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        debug!(provider = %self.config.name, "Requesting completion");

        let response = self
            .authorized(self.client.post(&self.config.url))
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        extract_completion(&body)
    }

    async fn probe(&self) -> ProviderResult<()> {
        let response = self
            .authorized(self.client.get(&self.config.health_url))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Status {
                status: status.as_u16(),
            })
        }
    }
}

/// Pulls the completion text out of a provider response body.
///
/// Accepts the two shapes seen in the wild: `{"completion": "..."}` and
/// `{"text": "..."}`.
fn extract_completion(body: &Value) -> ProviderResult<String> {
    body.get("completion")
        .or_else(|| body.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Decode("no completion text in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_completion_field() {
        let text = extract_completion(&json!({"completion": "hello"})).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn falls_back_to_text_field() {
        let text = extract_completion(&json!({"text": "hi"})).unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn missing_text_is_a_decode_error() {
        assert!(matches!(
            extract_completion(&json!({"tokens": 3})),
            Err(ProviderError::Decode(_))
        ));
    }
}
