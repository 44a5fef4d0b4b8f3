//! Request identity types.
//!
//! A [`RequestSnapshot`] is the engine's unit of traffic: everything
//! needed to issue (or re-issue) one HTTP request. A
//! [`RequestDescriptor`] is its normalized cache identity; two requests
//! with the same descriptor are cache-equivalent.

use furrow_core::Error;
use furrow_core::store::key::compute_cache_key;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::fetch::url::normalize;

/// A self-contained snapshot of one outbound request.
///
/// Header pairs keep their original order; the body is owned so a
/// snapshot can be persisted to the sync queue and replayed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestSnapshot {
    /// A GET request with no headers or body.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into(), headers: Vec::new(), body: None }
    }

    /// A POST request with a body.
    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self { method: "POST".into(), url: url.into(), headers: Vec::new(), body: Some(body) }
    }

    /// Append a header pair.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether this request mutates server state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self.method.as_str(), "GET" | "HEAD" | "OPTIONS")
    }

    /// Whether this request asks for a document (navigation traffic).
    pub fn is_document(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("accept") && value.contains("text/html"))
    }

    /// First value of a header, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Compute the normalized cache identity of this request.
    pub fn descriptor(&self) -> Result<RequestDescriptor, Error> {
        let url = normalize(&self.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(RequestDescriptor { method: self.method.clone(), url })
    }
}

/// Normalized identity of a request: method plus the URL with tracking
/// query parameters and the fragment removed. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: String,
    url: Url,
}

impl RequestDescriptor {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Stable store key for this identity.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_methods() {
        assert!(!RequestSnapshot::get("https://example.com/api/catalog").is_mutating());
        assert!(RequestSnapshot::post("https://example.com/api/orders", vec![]).is_mutating());

        let delete = RequestSnapshot {
            method: "DELETE".into(),
            url: "https://example.com/api/orders/1".into(),
            headers: Vec::new(),
            body: None,
        };
        assert!(delete.is_mutating());
    }

    #[test]
    fn test_document_detection() {
        let nav = RequestSnapshot::get("https://example.com/dashboard")
            .with_header("Accept", "text/html,application/xhtml+xml");
        assert!(nav.is_document());

        let api = RequestSnapshot::get("https://example.com/api/catalog").with_header("Accept", "application/json");
        assert!(!api.is_document());
    }

    #[test]
    fn test_descriptor_strips_tracking_params() {
        let a = RequestSnapshot::get("https://example.com/shop?page=2&utm_source=mail");
        let b = RequestSnapshot::get("https://example.com/shop?page=2");
        let da = a.descriptor().unwrap();
        let db = b.descriptor().unwrap();
        assert_eq!(da, db);
        assert_eq!(da.cache_key(), db.cache_key());
    }

    #[test]
    fn test_descriptor_distinguishes_method() {
        let get = RequestSnapshot::get("https://example.com/api/orders");
        let post = RequestSnapshot::post("https://example.com/api/orders", vec![]);
        assert_ne!(
            get.descriptor().unwrap().cache_key(),
            post.descriptor().unwrap().cache_key()
        );
    }

    #[test]
    fn test_descriptor_invalid_url() {
        let bad = RequestSnapshot::get("");
        assert!(matches!(bad.descriptor(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let req = RequestSnapshot::get("https://example.com/").with_header("Content-Type", "application/json");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("x-missing"), None);
    }
}
