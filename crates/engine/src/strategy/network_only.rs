//! Network-only strategy.
//!
//! Always attempts the network and never reads or writes the cache.
//! When an `EnqueueOnFailure` plugin is bound and a mutating request
//! fails at the transport level, the snapshot is parked in the sync
//! queue before the failure is returned; the caller stays responsible
//! for optimistic UI.

use furrow_core::Error;

use crate::request::RequestSnapshot;
use crate::routing::Plugin;
use crate::strategy::{ServedResponse, StrategyContext};

pub(crate) async fn run(
    ctx: &StrategyContext<'_>, plugins: &[Plugin], request: &RequestSnapshot,
) -> Result<ServedResponse, Error> {
    match ctx.gateway.send(request).await {
        Ok(response) => Ok(ServedResponse::from_network(response)),
        Err(err) => {
            if request.is_mutating()
                && let Some(Plugin::EnqueueOnFailure { topic }) = plugins
                    .iter()
                    .find(|p| matches!(p, Plugin::EnqueueOnFailure { .. }))
            {
                let id = ctx.queue.enqueue(topic, request).await?;
                tracing::info!(%topic, id, url = %request.url, "mutating request failed, queued for replay");
            }
            Err(err)
        }
    }
}
