//! Network-first strategy with cache fallback.
//!
//! The network fetch races a deadline. A network response in time is
//! stored (subject to the namespace's accepted statuses) and returned;
//! a late or failed fetch falls back to the cache, and a miss there
//! propagates the original failure.

use std::time::Duration;

use furrow_core::store::NamespacePolicy;
use furrow_core::Error;

use crate::request::{RequestDescriptor, RequestSnapshot};
use crate::strategy::{ServedResponse, StrategyContext, entry_from_response};

pub(crate) async fn run(
    ctx: &StrategyContext<'_>, policy: &NamespacePolicy, timeout: Duration, request: &RequestSnapshot,
    descriptor: &RequestDescriptor,
) -> Result<ServedResponse, Error> {
    let network_err = match tokio::time::timeout(timeout, ctx.gateway.send(request)).await {
        Ok(Ok(response)) => {
            let entry = entry_from_response(descriptor, &policy.name, &response);
            ctx.db.put_entry(policy, &entry).await?;
            return Ok(ServedResponse::from_network(response));
        }
        Ok(Err(err)) => err,
        Err(_) => Error::FetchTimeout(format!("no response within {}ms", timeout.as_millis())),
    };

    if let Some(entry) = ctx.db.get_entry(policy, &descriptor.cache_key()).await? {
        tracing::debug!(url = %descriptor.url(), %network_err, "network-first falling back to cache");
        return Ok(ServedResponse::from_entry(entry));
    }

    Err(network_err)
}
