//! Stale-while-revalidate strategy.
//!
//! A hit is returned to the caller immediately while a background task
//! refreshes the entry. Revalidation failures are logged and otherwise
//! swallowed; they never affect the already-returned response. A miss
//! behaves like cache-first's miss arm.

use std::sync::Arc;

use furrow_core::store::NamespacePolicy;
use furrow_core::Error;

use crate::request::{RequestDescriptor, RequestSnapshot};
use crate::strategy::{ServedResponse, StrategyContext, entry_from_response};

pub(crate) async fn run(
    ctx: &StrategyContext<'_>, policy: &NamespacePolicy, request: &RequestSnapshot, descriptor: &RequestDescriptor,
) -> Result<ServedResponse, Error> {
    if let Some(entry) = ctx.db.get_entry(policy, &descriptor.cache_key()).await? {
        let db = ctx.db.clone();
        let gateway = Arc::clone(ctx.gateway);
        let policy = policy.clone();
        let request = request.clone();
        let descriptor = descriptor.clone();
        tokio::spawn(async move {
            match gateway.send(&request).await {
                Ok(response) => {
                    let fresh = entry_from_response(&descriptor, &policy.name, &response);
                    if let Err(err) = db.put_entry(&policy, &fresh).await {
                        tracing::warn!(url = %descriptor.url(), %err, "revalidation store failed");
                    }
                }
                Err(err) => {
                    tracing::debug!(url = %descriptor.url(), %err, "revalidation fetch failed, keeping stale entry");
                }
            }
        });

        return Ok(ServedResponse::from_entry(entry));
    }

    let response = ctx.gateway.send(request).await?;
    let entry = entry_from_response(descriptor, &policy.name, &response);
    ctx.db.put_entry(policy, &entry).await?;
    Ok(ServedResponse::from_network(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Gateway;
    use crate::strategy::testing::{ScriptedGateway, ok_response};
    use crate::strategy::ResponseSource;
    use crate::sync::SyncQueue;
    use furrow_core::store::StoreDb;
    use std::time::Duration;

    const URL: &str = "https://fonts.example-cdn.com/inter.woff2";

    fn descriptor() -> RequestDescriptor {
        RequestSnapshot::get(URL).descriptor().unwrap()
    }

    async fn context() -> (StoreDb, SyncQueue) {
        let db = StoreDb::open_in_memory().await.unwrap();
        let queue = SyncQueue::new(db.clone(), Duration::from_secs(24 * 3600));
        (db, queue)
    }

    #[tokio::test]
    async fn test_hit_returns_stale_and_revalidates() {
        let (db, queue) = context().await;
        let policy = NamespacePolicy::new("cdn");
        db.put_entry(&policy, &entry_from_response(&descriptor(), "cdn", &ok_response(URL, b"stale")))
            .await
            .unwrap();

        let gateway: Arc<dyn Gateway> = Arc::new(ScriptedGateway::new(vec![Ok(ok_response(URL, b"fresh"))]));
        let ctx = StrategyContext { db: &db, gateway: &gateway, queue: &queue };

        let request = RequestSnapshot::get(URL);
        let served = run(&ctx, &policy, &request, &descriptor()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.body.as_ref(), b"stale");

        // give the background revalidation a moment to land
        tokio::time::sleep(Duration::from_millis(50)).await;
        let refreshed = db.get_entry(&policy, &descriptor().cache_key()).await.unwrap().unwrap();
        assert_eq!(refreshed.body, b"fresh");
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_stale_entry() {
        let (db, queue) = context().await;
        let policy = NamespacePolicy::new("cdn");
        db.put_entry(&policy, &entry_from_response(&descriptor(), "cdn", &ok_response(URL, b"stale")))
            .await
            .unwrap();

        let gateway: Arc<dyn Gateway> =
            Arc::new(ScriptedGateway::new(vec![Err(Error::NetworkUnreachable("offline".into()))]));
        let ctx = StrategyContext { db: &db, gateway: &gateway, queue: &queue };

        let request = RequestSnapshot::get(URL);
        let served = run(&ctx, &policy, &request, &descriptor()).await.unwrap();
        assert_eq!(served.body.as_ref(), b"stale");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let unchanged = db.get_entry(&policy, &descriptor().cache_key()).await.unwrap().unwrap();
        assert_eq!(unchanged.body, b"stale");
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let (db, queue) = context().await;
        let policy = NamespacePolicy::new("cdn");
        let gateway: Arc<dyn Gateway> = Arc::new(ScriptedGateway::new(vec![Ok(ok_response(URL, b"fresh"))]));
        let ctx = StrategyContext { db: &db, gateway: &gateway, queue: &queue };

        let request = RequestSnapshot::get(URL);
        let served = run(&ctx, &policy, &request, &descriptor()).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);

        let stored = db.get_entry(&policy, &descriptor().cache_key()).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_miss_with_network_failure_propagates() {
        let (db, queue) = context().await;
        let policy = NamespacePolicy::new("cdn");
        let gateway: Arc<dyn Gateway> =
            Arc::new(ScriptedGateway::new(vec![Err(Error::NetworkUnreachable("offline".into()))]));
        let ctx = StrategyContext { db: &db, gateway: &gateway, queue: &queue };

        let request = RequestSnapshot::get(URL);
        let result = run(&ctx, &policy, &request, &descriptor()).await;
        assert!(matches!(result, Err(Error::NetworkUnreachable(_))));
    }
}
