//! Synchronization queue: durable replay of failed mutating requests.
//!
//! Requests land here when a background-sync-eligible rule fails at the
//! transport level. On the connectivity-restored signal every entry is
//! replayed oldest-first, once per event. Delivery is at-least-once and
//! carries no idempotency key; deduplicating retried submissions is a
//! contract the origin server must satisfy.

use std::sync::Arc;
use std::time::Duration;

use furrow_core::store::StoreDb;
use furrow_core::Error;

use crate::fetch::Gateway;
use crate::request::RequestSnapshot;

/// Outcome of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries dropped for exceeding the retention window.
    pub expired: u64,
    /// Entries delivered and removed.
    pub replayed: usize,
    /// Entries that failed again and stay queued.
    pub failed: usize,
}

/// Handle to the durable queue with its retention policy.
#[derive(Clone)]
pub struct SyncQueue {
    db: StoreDb,
    retention: Duration,
}

impl SyncQueue {
    pub fn new(db: StoreDb, retention: Duration) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Park a failed request in a topic's queue. One row per failed
    /// attempt; identical requests are not coalesced.
    pub async fn enqueue(&self, topic: &str, request: &RequestSnapshot) -> Result<i64, Error> {
        let headers_json =
            serde_json::to_string(&request.headers).map_err(|e| Error::Queue(format!("headers: {e}")))?;
        self.db
            .enqueue_request(topic, &request.method, &request.url, &headers_json, request.body.clone())
            .await
    }

    /// Replay all queued entries, oldest first across every topic.
    ///
    /// Entries past the retention window are dropped silently before
    /// replay; that data loss is the accepted tradeoff for unbounded
    /// offline duration. Any origin response counts as delivery (the
    /// request reached the server); only transport failures leave an
    /// entry queued for the next connectivity-restored event.
    pub async fn replay(&self, gateway: &Arc<dyn Gateway>) -> Result<ReplayReport, Error> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(self.retention.as_secs() as i64)).to_rfc3339();
        let expired = self.db.drop_queued_before(&cutoff).await?;
        if expired > 0 {
            tracing::warn!(expired, "dropped queued requests past retention window");
        }

        let mut report = ReplayReport { expired, ..Default::default() };

        for queued in self.db.queued_requests().await? {
            let request = RequestSnapshot {
                method: queued.method.clone(),
                url: queued.url.clone(),
                headers: serde_json::from_str(&queued.headers_json).unwrap_or_default(),
                body: queued.body.clone(),
            };

            match gateway.send(&request).await {
                Ok(response) => {
                    self.db.remove_queued(queued.id).await?;
                    report.replayed += 1;
                    tracing::info!(
                        topic = %queued.topic,
                        id = queued.id,
                        status = response.status,
                        url = %queued.url,
                        "queued request replayed"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::debug!(
                        topic = %queued.topic,
                        id = queued.id,
                        %err,
                        "replay failed, entry stays queued"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Number of queued entries, optionally within one topic.
    pub async fn len(&self, topic: Option<&str>) -> Result<u64, Error> {
        self.db.queue_len(topic).await
    }
}
