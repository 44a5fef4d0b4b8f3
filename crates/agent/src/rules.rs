//! The platform's routing policy, expressed as data.
//!
//! Each traffic class gets the strategy its semantics require:
//!
//! - auth endpoints never serve stale credentials (network-only)
//! - read-heavy API endpoints prefer freshness with a bounded wait
//!   (network-first, cache fallback)
//! - order submission must never fake success; failures become durable
//!   retries (network-only + enqueue-on-failure)
//! - media and built static assets rarely change once published
//!   (cache-first)
//! - cross-origin CDN assets tolerate staleness (stale-while-revalidate)

use furrow_core::store::NamespacePolicy;
use furrow_core::{AppConfig, Error};
use furrow_engine::{Plugin, RoutingRule, RuleTable, StrategyKind};

/// Sync-queue topic for failed order submissions.
pub const ORDER_SUBMISSIONS_TOPIC: &str = "order-submissions";

const DAY_SECS: u64 = 24 * 60 * 60;

/// Build the default rule table. Declaration order is match order.
pub fn default_rule_table(config: &AppConfig) -> Result<RuleTable, Error> {
    let network_first = StrategyKind::NetworkFirst { fallback_timeout_ms: config.network_first_timeout_ms };

    let api_reads = NamespacePolicy::new("api-reads")
        .with_max_entries(64)
        .with_max_age_secs(DAY_SECS);

    let rules = vec![
        // credentials and auth decisions are never cached
        RoutingRule::new("/api/auth/*", StrategyKind::NetworkOnly, NamespacePolicy::new("auth"))?,
        // mutating order submission: durable retry on transport failure
        RoutingRule::new("/api/orders", StrategyKind::NetworkOnly, NamespacePolicy::new("order-writes"))?
            .with_method("POST")
            .with_plugin(Plugin::EnqueueOnFailure { topic: ORDER_SUBMISSIONS_TOPIC.into() }),
        // read-heavy domain endpoints: catalog, order reads, farm directory
        RoutingRule::new("/api/catalog*", network_first.clone(), api_reads.clone())?.with_method("GET"),
        RoutingRule::new("/api/orders*", network_first.clone(), api_reads.clone())?.with_method("GET"),
        RoutingRule::new("/api/farms*", network_first, api_reads)?.with_method("GET"),
        // bandwidth-expensive media, rarely republished
        RoutingRule::new(
            "/media/*",
            StrategyKind::CacheFirst,
            NamespacePolicy::new("media")
                .with_max_entries(60)
                .with_max_age_secs(30 * DAY_SECS),
        )?,
        // content-addressed build output
        RoutingRule::new(
            "/static/*",
            StrategyKind::CacheFirst,
            NamespacePolicy::new("static-assets").with_max_entries(128),
        )?,
        // cross-origin CDN fonts and scripts
        RoutingRule::new(
            "https://cdn.furrow.example/*",
            StrategyKind::StaleWhileRevalidate,
            NamespacePolicy::new("cdn-assets")
                .with_max_entries(32)
                .with_max_age_secs(7 * DAY_SECS),
        )?,
    ];

    Ok(RuleTable::new(rules))
}
