//! URL normalization for consistent cache keys.
//!
//! Runtime requests and precache manifest URLs go through the same
//! normalization, so a manifest entry and the request it later serves
//! compute the same cache key.

use std::sync::LazyLock;

use regex::Regex;

/// Query parameters injected by analytics and ad-click tracking.
///
/// Two requests that differ only in these parameters are the same
/// resource; the parameters are stripped before cache-key computation.
static TRACKING_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(utm_.+|fbclid|gclid|msclkid|mc_eid|igshid|twclid|wbraid|gbraid)$").unwrap());

/// Error type for URL normalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Normalize a URL string into its cache identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Drop tracking query parameters, preserving the order of the rest
pub fn normalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(mut host) = parsed.host_str() {
        let h = host.to_lowercase();
        host = h.as_str();
        parsed
            .set_host(Some(host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !TRACKING_PARAMS.is_match(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(n, v)| (n.as_str(), v.as_str())));
    }

    Ok(parsed)
}
