//! HTTP gateway: the engine's only path to the network.
//!
//! Strategies talk to the [`Gateway`] trait rather than to reqwest, so
//! the network seam can be swapped (or scripted in tests) without
//! touching routing or strategy code.
//!
//! ### Transport vs HTTP failures
//! A gateway returns `Ok` for any response the server produced, error
//! statuses included; cacheability is the namespace policy's concern.
//! `Err` means transport failure: unreachable network, TLS failure, or
//! the configured deadline elapsing.

pub mod url;

use bytes::Bytes;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use furrow_core::Error;

use crate::request::RequestSnapshot;

pub use self::url::{UrlError, normalize};

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// User agent string (default: "furrow-agent/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            user_agent: "furrow-agent/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// Response from a gateway send.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// The network seam used by every strategy and the sync queue.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Issue one request and return the response the origin produced.
    async fn send(&self, request: &RequestSnapshot) -> Result<FetchedResponse, Error>;
}

/// Gateway over reqwest with rustls TLS and content decompression.
pub struct HttpGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkUnreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, request: &RequestSnapshot) -> Result<FetchedResponse, Error> {
        let start = Instant::now();

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", request.url, e))
            } else {
                Error::NetworkUnreachable(format!("{}: {}", request.url, e))
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status,
            fetch_ms,
            bytes.len()
        );

        Ok(FetchedResponse { url: final_url, status, content_type, headers, bytes, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.user_agent, "furrow-agent/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetched_response_fields() {
        let response = FetchedResponse {
            url: "https://example.com/api/catalog".to_string(),
            status: 200,
            content_type: Some("application/json".to_string()),
            headers: Vec::new(),
            bytes: Bytes::new(),
            fetch_ms: 12,
        };

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.fetch_ms, 12);
    }

    #[tokio::test]
    async fn test_http_gateway_new() {
        let gateway = HttpGateway::new(GatewayConfig::default());
        assert!(gateway.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let gateway = HttpGateway::new(GatewayConfig::default()).unwrap();
        let request = RequestSnapshot {
            method: "NOT A METHOD".into(),
            url: "https://example.com/".into(),
            headers: Vec::new(),
            body: None,
        };
        let result = gateway.send(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
