//! Durable storage for the synchronization queue.
//!
//! Mutating requests that fail while offline are parked here, one row
//! per failed attempt (no coalescing), and replayed oldest-first when
//! connectivity returns. Rows past the retention window are dropped
//! silently; that data loss is the accepted price of unbounded offline
//! duration.

use super::connection::StoreDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// One queued request awaiting replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Assigned on insert; replay order is ascending id.
    pub id: i64,
    pub topic: String,
    pub method: String,
    pub url: String,
    pub headers_json: String,
    pub body: Option<Vec<u8>>,
    pub enqueued_at: String,
}

impl StoreDb {
    /// Append a request to a topic's queue. Returns the assigned id.
    pub async fn enqueue_request(
        &self, topic: &str, method: &str, url: &str, headers_json: &str, body: Option<Vec<u8>>,
    ) -> Result<i64, Error> {
        let topic = topic.to_string();
        let method = method.to_string();
        let url = url.to_string();
        let headers_json = headers_json.to_string();
        let enqueued_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO sync_queue (topic, method, url, headers_json, body, enqueued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![topic, method, url, headers_json, body, enqueued_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// All queued requests across all topics, oldest first.
    pub async fn queued_requests(&self) -> Result<Vec<QueuedRequest>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<QueuedRequest>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, topic, method, url, headers_json, body, enqueued_at
                     FROM sync_queue ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(QueuedRequest {
                        id: row.get(0)?,
                        topic: row.get(1)?,
                        method: row.get(2)?,
                        url: row.get(3)?,
                        headers_json: row.get(4)?,
                        body: row.get(5)?,
                        enqueued_at: row.get(6)?,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a successfully replayed request.
    pub async fn remove_queued(&self, id: i64) -> Result<(), Error> {
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Drop queued requests older than the cutoff. Returns the number
    /// dropped.
    pub async fn drop_queued_before(&self, cutoff: &str) -> Result<u64, Error> {
        let cutoff = cutoff.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let dropped = conn.execute("DELETE FROM sync_queue WHERE enqueued_at < ?1", params![cutoff])?;
                Ok(dropped as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count queued requests, optionally for one topic.
    pub async fn queue_len(&self, topic: Option<&str>) -> Result<u64, Error> {
        let topic = topic.map(|t| t.to_string());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = match topic {
                    Some(topic) => conn.query_row(
                        "SELECT COUNT(*) FROM sync_queue WHERE topic = ?1",
                        params![topic],
                        |row| row.get(0),
                    )?,
                    None => conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?,
                };
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order() {
        let db = StoreDb::open_in_memory().await.unwrap();
        for i in 0..3 {
            db.enqueue_request(
                "order-submissions",
                "POST",
                &format!("https://example.com/api/orders?attempt={i}"),
                "{}",
                Some(b"{\"crop\":\"kale\"}".to_vec()),
            )
            .await
            .unwrap();
        }

        let queued = db.queued_requests().await.unwrap();
        assert_eq!(queued.len(), 3);
        assert!(queued[0].id < queued[1].id && queued[1].id < queued[2].id);
        assert!(queued[0].url.ends_with("attempt=0"));
        assert!(queued[2].url.ends_with("attempt=2"));
    }

    #[tokio::test]
    async fn test_no_coalescing_of_identical_requests() {
        let db = StoreDb::open_in_memory().await.unwrap();
        for _ in 0..2 {
            db.enqueue_request("order-submissions", "POST", "https://example.com/api/orders", "{}", None)
                .await
                .unwrap();
        }
        assert_eq!(db.queue_len(Some("order-submissions")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_queued() {
        let db = StoreDb::open_in_memory().await.unwrap();
        let id = db
            .enqueue_request("order-submissions", "POST", "https://example.com/api/orders", "{}", None)
            .await
            .unwrap();
        db.remove_queued(id).await.unwrap();
        assert_eq!(db.queue_len(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_queued_before_cutoff() {
        let db = StoreDb::open_in_memory().await.unwrap();
        db.enqueue_request("order-submissions", "POST", "https://example.com/api/orders", "{}", None)
            .await
            .unwrap();

        let future = (chrono::Utc::now() + chrono::Duration::seconds(10)).to_rfc3339();
        let dropped = db.drop_queued_before(&future).await.unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(db.queue_len(None).await.unwrap(), 0);
    }
}
