//! Cache entry CRUD with per-namespace eviction.
//!
//! A namespace is a named partition of the cache with its own bounds:
//! an optional entry cap (insertion-order eviction, enforced atomically
//! with each write) and an optional TTL (expired entries read as misses
//! and are deleted opportunistically).

use super::connection::StoreDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Eviction and acceptance policy for one cache namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacePolicy {
    /// Unique namespace name.
    pub name: String,

    /// Entry cap. On insert, the oldest entries are evicted until the
    /// count fits. None means unbounded.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// TTL in seconds. Entries older than this read as misses.
    /// None means entries never expire.
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    /// Status codes that may be stored. 0 covers opaque responses.
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<u16>,
}

fn default_accepted_statuses() -> Vec<u16> {
    vec![0, 200]
}

impl NamespacePolicy {
    /// Create a policy with no bounds and the default accepted statuses.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_entries: None,
            max_age_secs: None,
            accepted_statuses: default_accepted_statuses(),
        }
    }

    /// Cap the namespace at `max` entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Expire entries after `secs` seconds.
    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    /// Replace the accepted status codes.
    pub fn with_accepted_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.accepted_statuses = statuses;
        self
    }

    /// Whether a response with this status may be stored.
    pub fn accepts(&self, status: u16) -> bool {
        self.accepted_statuses.contains(&status)
    }

    /// RFC 3339 cutoff below which entries are expired, if a TTL is set.
    fn expiry_cutoff(&self) -> Option<String> {
        self.max_age_secs
            .map(|secs| (chrono::Utc::now() - chrono::Duration::seconds(secs as i64)).to_rfc3339())
    }
}

/// One cached request/response pair within a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub namespace: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoreDb {
    /// Get a cache entry by key.
    ///
    /// Entries older than the namespace TTL behave as misses and are
    /// deleted before the lookup.
    pub async fn get_entry(&self, policy: &NamespacePolicy, key: &str) -> Result<Option<CacheEntry>, Error> {
        let namespace = policy.name.clone();
        let cutoff = policy.expiry_cutoff();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                if let Some(cutoff) = &cutoff {
                    conn.execute(
                        "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2 AND stored_at < ?3",
                        params![namespace, key, cutoff],
                    )?;
                }

                let mut stmt = conn.prepare(
                    "SELECT key, namespace, method, url, status, content_type, headers_json, body, stored_at
                     FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![namespace, key], |row| {
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        namespace: row.get(1)?,
                        method: row.get(2)?,
                        url: row.get(3)?,
                        status: row.get::<_, i64>(4)? as u16,
                        content_type: row.get(5)?,
                        headers_json: row.get(6)?,
                        body: row.get(7)?,
                        stored_at: row.get(8)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a cache entry, enforcing the namespace policy.
    ///
    /// Returns false without touching the store when the entry's status
    /// is not accepted by the namespace. Eviction of the oldest entries
    /// runs in the same transaction as the write, so the cap is never
    /// observably exceeded.
    pub async fn put_entry(&self, policy: &NamespacePolicy, entry: &CacheEntry) -> Result<bool, Error> {
        if !policy.accepts(entry.status) {
            tracing::debug!(
                namespace = %policy.name,
                status = entry.status,
                "response status not cacheable, skipping store"
            );
            return Ok(false);
        }

        let max_entries = policy.max_entries.map(|m| m as i64);
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;

                tx.execute(
                    "INSERT OR REPLACE INTO cache_entries
                        (key, namespace, method, url, status, content_type, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        &entry.key,
                        &entry.namespace,
                        &entry.method,
                        &entry.url,
                        entry.status as i64,
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;

                if let Some(max) = max_entries {
                    let count: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?1",
                        params![entry.namespace],
                        |row| row.get(0),
                    )?;
                    if count > max {
                        tx.execute(
                            "DELETE FROM cache_entries WHERE namespace = ?1 AND rowid IN (
                                SELECT rowid FROM cache_entries WHERE namespace = ?1
                                ORDER BY rowid ASC LIMIT ?2
                            )",
                            params![entry.namespace, count - max],
                        )?;
                    }
                }

                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a single entry. Returns true if a row was removed.
    pub async fn delete_entry(&self, namespace: &str, key: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry in a namespace. Returns the number deleted.
    pub async fn purge_namespace(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM cache_entries WHERE namespace = ?1", params![name])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry outside the named namespaces.
    ///
    /// Used on version rollover to drop caches owned by superseded
    /// agent versions. Returns the number deleted.
    pub async fn purge_all_except(&self, keep: &[String]) -> Result<u64, Error> {
        let keep = keep.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let placeholders = (1..=keep.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = if keep.is_empty() {
                    "DELETE FROM cache_entries".to_string()
                } else {
                    format!("DELETE FROM cache_entries WHERE namespace NOT IN ({placeholders})")
                };
                let deleted = conn.execute(&sql, rusqlite::params_from_iter(keep.iter()))?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count live entries in a namespace.
    pub async fn namespace_len(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all expired entries in a namespace in one sweep.
    ///
    /// Returns the number deleted. A namespace with no TTL sweeps
    /// nothing.
    pub async fn sweep_expired(&self, policy: &NamespacePolicy) -> Result<u64, Error> {
        let Some(cutoff) = policy.expiry_cutoff() else {
            return Ok(0);
        };
        let namespace = policy.name.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND stored_at < ?2",
                    params![namespace, cutoff],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
