//! Strategy executors.
//!
//! Four interchangeable algorithms resolve a request to a response
//! using some combination of network and cache:
//!
//! - network-only (optionally queueing failed mutations for replay)
//! - network-first with bounded wait and cache fallback
//! - cache-first
//! - stale-while-revalidate
//!
//! Executors receive the rule's bound namespace and plugins; they never
//! look at the rule table themselves.

mod cache_first;
mod network_first;
mod network_only;
mod stale_while_revalidate;

use std::sync::Arc;

use bytes::Bytes;
use furrow_core::store::{CacheEntry, StoreDb};
use furrow_core::Error;

use crate::fetch::{FetchedResponse, Gateway};
use crate::request::{RequestDescriptor, RequestSnapshot};
use crate::routing::RoutingRule;
use crate::sync::SyncQueue;

/// Which algorithm a rule runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    /// Always network; never touches the cache.
    NetworkOnly,
    /// Network raced against a deadline, cache as fallback.
    NetworkFirst { fallback_timeout_ms: u64 },
    /// Cache hit short-circuits; miss fetches and stores.
    CacheFirst,
    /// Cache hit returns immediately while the entry refreshes in the
    /// background.
    StaleWhileRevalidate,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkOnly => write!(f, "network-only"),
            Self::NetworkFirst { fallback_timeout_ms } => write!(f, "network-first({fallback_timeout_ms}ms)"),
            Self::CacheFirst => write!(f, "cache-first"),
            Self::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

/// The response handed back to the caller of `dispatch`.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ServedResponse {
    /// Wrap a fresh network response.
    pub fn from_network(response: FetchedResponse) -> Self {
        Self {
            url: response.url,
            status: response.status,
            content_type: response.content_type,
            headers: response.headers,
            body: response.bytes,
            source: ResponseSource::Network,
        }
    }

    /// Rehydrate a stored cache entry.
    pub fn from_entry(entry: CacheEntry) -> Self {
        let headers = entry
            .headers_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();
        Self {
            url: entry.url,
            status: entry.status,
            content_type: entry.content_type,
            headers,
            body: Bytes::from(entry.body),
            source: ResponseSource::Cache,
        }
    }
}

/// Build the cache entry a network response stores under a descriptor.
pub fn entry_from_response(
    descriptor: &RequestDescriptor, namespace: &str, response: &FetchedResponse,
) -> CacheEntry {
    CacheEntry {
        key: descriptor.cache_key(),
        namespace: namespace.to_string(),
        method: descriptor.method().to_string(),
        url: descriptor.url().to_string(),
        status: response.status,
        content_type: response.content_type.clone(),
        headers_json: serde_json::to_string(&response.headers).ok(),
        body: response.bytes.to_vec(),
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Shared handles every executor needs.
pub struct StrategyContext<'a> {
    pub db: &'a StoreDb,
    pub gateway: &'a Arc<dyn Gateway>,
    pub queue: &'a SyncQueue,
}

/// Run the rule's strategy for one request.
pub async fn execute(
    ctx: &StrategyContext<'_>, rule: &RoutingRule, request: &RequestSnapshot, descriptor: &RequestDescriptor,
) -> Result<ServedResponse, Error> {
    match &rule.strategy {
        StrategyKind::NetworkOnly => network_only::run(ctx, &rule.plugins, request).await,
        StrategyKind::NetworkFirst { fallback_timeout_ms } => {
            let timeout = std::time::Duration::from_millis(*fallback_timeout_ms);
            network_first::run(ctx, &rule.namespace, timeout, request, descriptor).await
        }
        StrategyKind::CacheFirst => cache_first::run(ctx, &rule.namespace, request, descriptor).await,
        StrategyKind::StaleWhileRevalidate => {
            stale_while_revalidate::run(ctx, &rule.namespace, request, descriptor).await
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_display() {
        assert_eq!(StrategyKind::NetworkOnly.to_string(), "network-only");
        assert_eq!(
            StrategyKind::NetworkFirst { fallback_timeout_ms: 10_000 }.to_string(),
            "network-first(10000ms)"
        );
        assert_eq!(StrategyKind::CacheFirst.to_string(), "cache-first");
        assert_eq!(StrategyKind::StaleWhileRevalidate.to_string(), "stale-while-revalidate");
    }

    #[test]
    fn test_served_response_from_entry_rehydrates_headers() {
        let entry = CacheEntry {
            key: "k".into(),
            namespace: "api-reads".into(),
            method: "GET".into(),
            url: "https://example.com/api/catalog".into(),
            status: 200,
            content_type: Some("application/json".into()),
            headers_json: Some(r#"[["content-type","application/json"]]"#.into()),
            body: b"[]".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        let served = ServedResponse::from_entry(entry);
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.headers.len(), 1);
        assert_eq!(served.body.as_ref(), b"[]");
    }
}
