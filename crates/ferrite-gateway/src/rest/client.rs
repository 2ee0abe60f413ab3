//! The rate-limited REST client.
//!
//! Every call flows through the per-route bucket for its route key: callers
//! are suspended (a genuine wait, not a spin) while the bucket is exhausted,
//! and the bucket is updated from response metadata unconditionally — the
//! server reports budget state even on error responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{ClientBuilder, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use ferrite_core::{RestError, RestResult};

use crate::config::RestConfig;

use super::bucket::RouteBucket;
use super::route::route_key;

/// Fallback when a 429 carries no usable retry-after.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Authenticated REST client with per-route rate limiting.
///
/// The bucket map is the only shared mutable state in this component; each
/// bucket is guarded by its own fair mutex, so unrelated routes never
/// contend.
pub struct RestClient {
    http: reqwest::Client,
    config: RestConfig,
    buckets: parking_lot::Mutex<HashMap<String, Arc<RouteBucket>>>,
}

impl RestClient {
    /// Creates a client from the given configuration.
    pub fn new(config: RestConfig) -> RestResult<Self> {
        let http = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RestError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            buckets: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Issues one authenticated request.
    ///
    /// Suspends while the route's budget is exhausted. Server errors are
    /// retried a bounded number of times with linear backoff; a 429 is not
    /// retried — the bucket is updated and [`RestError::RateLimited`] is
    /// returned for the caller to decide.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> RestResult<Value> {
        let route = route_key(&method, path);
        let bucket = self.bucket(&route);

        // Holding the guard across the request linearizes same-route calls:
        // the bucket always reflects the most recent response.
        let mut state = bucket.acquire().await;

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let mut request = self.http.request(method.clone(), &url);
            if let Some(token) = &self.config.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| RestError::Transport(e.to_string()))?;
            let status = response.status();

            // Budget metadata arrives on every response, errors included.
            let (remaining, reset_after) = parse_budget(response.headers());
            state.apply(remaining, reset_after);

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response).await;
                state.exhaust(retry_after);
                debug!(route = %route, retry_after = ?retry_after, "Rate limited");
                return Err(RestError::RateLimited { route, retry_after });
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(RestError::AuthenticationRejected {
                    status: status.as_u16(),
                });
            }

            if status.is_server_error() {
                if attempts <= self.config.server_error_retries {
                    let delay = self.config.retry_backoff * attempts;
                    warn!(
                        route = %route,
                        status = status.as_u16(),
                        attempt = attempts,
                        delay = ?delay,
                        "Server error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(RestError::Server {
                    status: status.as_u16(),
                    attempts,
                });
            }

            if !status.is_success() {
                return Err(RestError::Server {
                    status: status.as_u16(),
                    attempts,
                });
            }

            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response
                .json()
                .await
                .map_err(|e| RestError::Decode(e.to_string()));
        }
    }

    /// Returns the bucket for a route, creating it lazily on first use.
    ///
    /// Buckets are never destroyed; the map is bounded by route cardinality.
    fn bucket(&self, route: &str) -> Arc<RouteBucket> {
        let mut buckets = self.buckets.lock();
        Arc::clone(
            buckets
                .entry(route.to_string())
                .or_insert_with(|| Arc::new(RouteBucket::new())),
        )
    }

    /// Number of buckets currently tracked. Test and diagnostics hook.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url)
            .field("buckets", &self.bucket_count())
            .finish()
    }
}

/// Extracts budget metadata from response headers.
fn parse_budget(headers: &HeaderMap) -> (Option<u32>, Option<Duration>) {
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let reset_after = headers
        .get("x-ratelimit-reset-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64);
    (remaining, reset_after)
}

/// Extracts the retry-after of a 429 from the body, falling back to the
/// header, then to a conservative default.
async fn parse_retry_after(response: reqwest::Response) -> Duration {
    let header = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());

    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    body.get("retry_after")
        .and_then(Value::as_f64)
        .or(header)
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn budget_headers_are_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("3"));
        headers.insert("x-ratelimit-reset-after", HeaderValue::from_static("1.5"));

        let (remaining, reset_after) = parse_budget(&headers);
        assert_eq!(remaining, Some(3));
        assert_eq!(reset_after, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn missing_budget_headers_parse_to_none() {
        let (remaining, reset_after) = parse_budget(&HeaderMap::new());
        assert_eq!(remaining, None);
        assert_eq!(reset_after, None);
    }

    #[test]
    fn malformed_budget_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("many"));
        headers.insert("x-ratelimit-reset-after", HeaderValue::from_static("-2"));

        let (remaining, reset_after) = parse_budget(&headers);
        assert_eq!(remaining, None);
        assert_eq!(reset_after, None);
    }

    #[tokio::test]
    async fn buckets_are_created_lazily_per_route() {
        let client = RestClient::new(RestConfig::new("http://localhost:0")).unwrap();
        assert_eq!(client.bucket_count(), 0);

        client.bucket("GET:channels/1");
        client.bucket("GET:channels/1");
        client.bucket("GET:channels/2");
        assert_eq!(client.bucket_count(), 2);
    }
}
