//! HTTP client abstraction for testability

use super::types::SourceError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default User-Agent string for HTTP requests.
/// Public Overpass instances ask clients to identify themselves.
const DEFAULT_USER_AGENT: &str = concat!("cityscope/", env!("CARGO_PKG_VERSION"));

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP POST with an `application/x-www-form-urlencoded` body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `fields` - Form fields as (name, value) pairs
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a new client with the default timeout.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Creates a new client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn read_response(
        url: &str,
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Vec<u8>, SourceError> {
        let response = match result {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(SourceError::Http(format!("Request failed: {}", e)));
            }
        };

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(SourceError::from_status(status.as_u16(), url));
        }

        // Read response body
        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(SourceError::Http(format!("Failed to read response: {}", e)))
            }
        }
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, SourceError> {
        trace!(url = url, fields = fields.len(), "HTTP POST request starting");
        let result = self.client.post(url).form(fields).send().await;
        Self::read_response(url, result).await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock async HTTP client for testing.
    ///
    /// Returns `response` for every request and records the last form body.
    #[derive(Clone)]
    pub struct MockAsyncHttpClient {
        pub response: Result<Vec<u8>, SourceError>,
        pub calls: Arc<AtomicUsize>,
        pub last_form: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockAsyncHttpClient {
        pub fn new(response: Result<Vec<u8>, SourceError>) -> Self {
            Self {
                response,
                calls: Arc::new(AtomicUsize::new(0)),
                last_form: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_json(json: &str) -> Self {
            Self::new(Ok(json.as_bytes().to_vec()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn post_form(
            &self,
            _url: &str,
            fields: &[(&str, &str)],
        ) -> Result<Vec<u8>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_form.lock().unwrap() = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_mock_async_client_success() {
        let mock = MockAsyncHttpClient::new(Ok(vec![1, 2, 3, 4]));

        let result = mock.post_form("http://example.com", &[]).await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_async_client_records_form() {
        let mock = MockAsyncHttpClient::with_json("{}");

        mock.post_form("http://example.com", &[("data", "node;out;")])
            .await
            .unwrap();
        let form = mock.last_form.lock().unwrap().clone();
        assert_eq!(form, vec![("data".to_string(), "node;out;".to_string())]);
    }

    #[test]
    fn test_status_429_is_rate_limit() {
        assert_eq!(
            SourceError::from_status(429, "http://x"),
            SourceError::RateLimited {
                url: "http://x".to_string()
            }
        );
        assert!(matches!(
            SourceError::from_status(504, "http://x"),
            SourceError::Status { status: 504, .. }
        ));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(AsyncReqwestClient::with_timeout(5).is_ok());
    }
}
