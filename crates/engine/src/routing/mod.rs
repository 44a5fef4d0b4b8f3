//! Routing rule table and request dispatcher.
//!
//! Rules are data, not code: an ordered list of (pattern, method,
//! strategy, namespace, plugins) supplied by the hosting application at
//! startup. The first rule whose matcher accepts a request applies; a
//! request no rule matches falls through to plain network-only
//! passthrough.

pub mod pattern;

use std::sync::Arc;

use furrow_core::store::{NamespacePolicy, StoreDb};
use furrow_core::Error;

use crate::fetch::Gateway;
use crate::request::{RequestDescriptor, RequestSnapshot};
use crate::strategy::{self, ServedResponse, StrategyContext, StrategyKind};
use crate::sync::SyncQueue;

pub use pattern::RoutePattern;

/// Behavior attached to a rule beyond its strategy.
#[derive(Debug, Clone)]
pub enum Plugin {
    /// On transport failure of a mutating request, park the snapshot in
    /// the named sync-queue topic for replay.
    EnqueueOnFailure { topic: String },
}

/// One routing rule: matcher, strategy, target namespace, plugins.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub pattern: RoutePattern,
    pub method: Option<String>,
    pub strategy: StrategyKind,
    pub namespace: NamespacePolicy,
    pub plugins: Vec<Plugin>,
}

impl RoutingRule {
    /// Build a rule from a pattern string.
    pub fn new(pattern: &str, strategy: StrategyKind, namespace: NamespacePolicy) -> Result<Self, Error> {
        Ok(Self { pattern: RoutePattern::compile(pattern)?, method: None, strategy, namespace, plugins: Vec::new() })
    }

    /// Restrict the rule to one HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Attach a plugin.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    fn accepts(&self, descriptor: &RequestDescriptor) -> bool {
        if let Some(method) = &self.method
            && !method.eq_ignore_ascii_case(descriptor.method())
        {
            return false;
        }
        self.pattern.matches(descriptor.url())
    }
}

/// Ordered rule list, first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<RoutingRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule accepting the descriptor, in declaration order.
    pub fn select(&self, descriptor: &RequestDescriptor) -> Option<&RoutingRule> {
        self.rules.iter().find(|rule| rule.accepts(descriptor))
    }

    /// Every namespace policy bound by a rule, in declaration order.
    ///
    /// Used for version-rollover cleanup (which namespaces to keep) and
    /// for expiry sweeps.
    pub fn namespaces(&self) -> Vec<&NamespacePolicy> {
        self.rules.iter().map(|rule| &rule.namespace).collect()
    }
}

/// Request dispatcher: every request the application issues goes
/// through `dispatch`, which selects a rule and runs its strategy.
pub struct Router {
    db: StoreDb,
    gateway: Arc<dyn Gateway>,
    queue: SyncQueue,
    table: RuleTable,
}

impl Router {
    pub fn new(db: StoreDb, gateway: Arc<dyn Gateway>, queue: SyncQueue, table: RuleTable) -> Self {
        Self { db, gateway, queue, table }
    }

    /// Resolve one request to a response.
    ///
    /// The first matching rule's strategy runs with the rule's bound
    /// namespace and plugins. No match means network-only passthrough.
    pub async fn dispatch(&self, request: &RequestSnapshot) -> Result<ServedResponse, Error> {
        let descriptor = request.descriptor()?;

        let ctx = StrategyContext { db: &self.db, gateway: &self.gateway, queue: &self.queue };

        match self.table.select(&descriptor) {
            Some(rule) => {
                tracing::debug!(
                    pattern = rule.pattern.as_str(),
                    strategy = %rule.strategy,
                    namespace = %rule.namespace.name,
                    url = %descriptor.url(),
                    "rule matched"
                );
                strategy::execute(&ctx, rule, request, &descriptor).await
            }
            None => {
                tracing::debug!(url = %descriptor.url(), "no rule matched, network passthrough");
                let response = self.gateway.send(request).await?;
                Ok(ServedResponse::from_network(response))
            }
        }
    }

    /// The rule table this router dispatches against.
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// The sync queue shared with the strategies.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// The gateway shared with the strategies.
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(method: &str, url: &str) -> RequestDescriptor {
        let snapshot = RequestSnapshot {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        };
        snapshot.descriptor().unwrap()
    }

    fn rule(pattern: &str, namespace: &str) -> RoutingRule {
        RoutingRule::new(pattern, StrategyKind::CacheFirst, NamespacePolicy::new(namespace)).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let table = RuleTable::new(vec![
            rule("/api/orders*", "first"),
            rule("/api/*", "second"),
        ]);

        let selected = table.select(&descriptor("GET", "https://example.com/api/orders/1")).unwrap();
        assert_eq!(selected.namespace.name, "first");

        let selected = table.select(&descriptor("GET", "https://example.com/api/catalog")).unwrap();
        assert_eq!(selected.namespace.name, "second");
    }

    #[test]
    fn test_no_match_falls_through() {
        let table = RuleTable::new(vec![rule("/api/*", "api")]);
        assert!(table.select(&descriptor("GET", "https://example.com/about")).is_none());
    }

    #[test]
    fn test_method_restriction() {
        let table = RuleTable::new(vec![rule("/api/orders", "writes").with_method("POST")]);
        assert!(table.select(&descriptor("GET", "https://example.com/api/orders")).is_none());
        assert!(table.select(&descriptor("POST", "https://example.com/api/orders")).is_some());
    }

    #[test]
    fn test_method_match_case_insensitive() {
        let table = RuleTable::new(vec![rule("/api/orders", "writes").with_method("post")]);
        assert!(table.select(&descriptor("POST", "https://example.com/api/orders")).is_some());
    }

    mod dispatch {
        use super::*;
        use crate::strategy::testing::{ScriptedGateway, ok_response};
        use crate::strategy::ResponseSource;
        use furrow_core::store::StoreDb;
        use std::time::Duration;

        const ORDERS_URL: &str = "https://example.com/api/orders/123";

        async fn router_with(table: RuleTable, gateway: Arc<dyn Gateway>) -> (Router, StoreDb) {
            let db = StoreDb::open_in_memory().await.unwrap();
            let queue = SyncQueue::new(db.clone(), Duration::from_secs(24 * 3600));
            (Router::new(db.clone(), gateway, queue, table), db)
        }

        fn network_first_table() -> RuleTable {
            RuleTable::new(vec![
                RoutingRule::new(
                    "/api/orders*",
                    StrategyKind::NetworkFirst { fallback_timeout_ms: 100 },
                    NamespacePolicy::new("api-reads"),
                )
                .unwrap(),
            ])
        }

        #[tokio::test]
        async fn test_offline_with_cache_entry_serves_cache() {
            // warm the cache through a successful dispatch, then go offline
            let gateway: Arc<dyn Gateway> = Arc::new(ScriptedGateway::new(vec![
                Ok(ok_response(ORDERS_URL, b"order")),
                Err(Error::NetworkUnreachable("offline".into())),
            ]));
            let (router, _db) = router_with(network_first_table(), gateway).await;

            let request = RequestSnapshot::get(ORDERS_URL);
            let first = router.dispatch(&request).await.unwrap();
            assert_eq!(first.source, ResponseSource::Network);

            let second = router.dispatch(&request).await.unwrap();
            assert_eq!(second.source, ResponseSource::Cache);
            assert_eq!(second.body.as_ref(), b"order");
        }

        #[tokio::test]
        async fn test_offline_without_cache_entry_fails() {
            let gateway: Arc<dyn Gateway> =
                Arc::new(ScriptedGateway::new(vec![Err(Error::NetworkUnreachable("offline".into()))]));
            let (router, _db) = router_with(network_first_table(), gateway).await;

            let request = RequestSnapshot::get(ORDERS_URL);
            let result = router.dispatch(&request).await;
            assert!(matches!(result, Err(Error::NetworkUnreachable(_))));
        }

        #[tokio::test]
        async fn test_unmatched_request_uses_network_passthrough() {
            let gateway = Arc::new(ScriptedGateway::new(vec![Ok(ok_response("https://example.com/about", b"hi"))]));
            let dyn_gateway: Arc<dyn Gateway> = gateway.clone();
            let (router, db) = router_with(network_first_table(), dyn_gateway).await;

            let request = RequestSnapshot::get("https://example.com/about");
            let served = router.dispatch(&request).await.unwrap();
            assert_eq!(served.source, ResponseSource::Network);

            // passthrough never writes the cache
            let key = request.descriptor().unwrap().cache_key();
            let policy = NamespacePolicy::new("api-reads");
            assert!(db.get_entry(&policy, &key).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_double_failure_enqueues_twice_then_replays_in_order() {
            let submit_url = "https://example.com/api/orders";
            let gateway: Arc<dyn Gateway> = Arc::new(ScriptedGateway::new(vec![
                Err(Error::NetworkUnreachable("offline".into())),
                Err(Error::NetworkUnreachable("offline".into())),
                Ok(ok_response(submit_url, b"accepted")),
                Ok(ok_response(submit_url, b"accepted")),
            ]));
            let table = RuleTable::new(vec![
                RoutingRule::new("/api/orders", StrategyKind::NetworkOnly, NamespacePolicy::new("orders"))
                    .unwrap()
                    .with_method("POST")
                    .with_plugin(Plugin::EnqueueOnFailure { topic: "order-submissions".into() }),
            ]);
            let (router, _db) = router_with(table, gateway).await;

            let first = RequestSnapshot::post(submit_url, b"{\"order\":1}".to_vec());
            let second = RequestSnapshot::post(submit_url, b"{\"order\":2}".to_vec());
            assert!(router.dispatch(&first).await.is_err());
            assert!(router.dispatch(&second).await.is_err());
            // one entry per failed attempt, no coalescing
            assert_eq!(router.queue().len(Some("order-submissions")).await.unwrap(), 2);

            let report = router.queue().replay(router.gateway()).await.unwrap();
            assert_eq!(report.replayed, 2);
            assert_eq!(router.queue().len(None).await.unwrap(), 0);
        }
    }
}
