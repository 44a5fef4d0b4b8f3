//! Cache-first strategy.
//!
//! A hit returns immediately with no network access. A miss fetches,
//! stores the result subject to the namespace's accepted statuses, and
//! returns it; a network failure on miss propagates.

use furrow_core::store::NamespacePolicy;
use furrow_core::Error;

use crate::request::{RequestDescriptor, RequestSnapshot};
use crate::strategy::{ServedResponse, StrategyContext, entry_from_response};

pub(crate) async fn run(
    ctx: &StrategyContext<'_>, policy: &NamespacePolicy, request: &RequestSnapshot, descriptor: &RequestDescriptor,
) -> Result<ServedResponse, Error> {
    if let Some(entry) = ctx.db.get_entry(policy, &descriptor.cache_key()).await? {
        tracing::debug!(url = %descriptor.url(), "cache-first hit");
        return Ok(ServedResponse::from_entry(entry));
    }

    let response = ctx.gateway.send(request).await?;
    let entry = entry_from_response(descriptor, &policy.name, &response);
    ctx.db.put_entry(policy, &entry).await?;
    Ok(ServedResponse::from_network(response))
}
