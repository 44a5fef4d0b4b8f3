//! Precache manager: install-time warm-up and version rollover.
//!
//! At install the manifest's build artifacts are fetched through the
//! gateway directly, bypassing the rule table, into a namespace named
//! after the version. Manifest URLs get the same tracking-parameter
//! stripping as runtime traffic, so both sides compute the same cache
//! key. On activation every namespace outside the current version's
//! declared set is purged.

use std::sync::Arc;

use furrow_core::store::{NamespacePolicy, StoreDb};
use furrow_core::Error;
use furrow_engine::strategy::entry_from_response;
use furrow_engine::{Gateway, RequestSnapshot, ServedResponse};

/// One build artifact to keep warm: URL plus content revision.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub revision: Option<String>,
}

/// The ordered asset set one build version declares.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    pub version: String,
    pub entries: Vec<ManifestEntry>,
    /// Document served when navigation fails and no rule resolves.
    pub fallback_url: String,
}

impl Manifest {
    /// The cache namespace owned by this version.
    pub fn namespace_name(&self) -> String {
        format!("precache-{}", self.version)
    }
}

/// Installs and serves the precached app shell for one version.
pub struct PrecacheManager {
    db: StoreDb,
    gateway: Arc<dyn Gateway>,
    policy: NamespacePolicy,
    fallback_url: String,
}

impl PrecacheManager {
    pub fn new(db: StoreDb, gateway: Arc<dyn Gateway>, manifest: &Manifest) -> Self {
        Self {
            db,
            gateway,
            policy: NamespacePolicy::new(manifest.namespace_name()),
            fallback_url: manifest.fallback_url.clone(),
        }
    }

    /// The namespace this version's assets live in.
    pub fn namespace(&self) -> &str {
        &self.policy.name
    }

    /// Fetch and store every manifest asset. Returns the number newly
    /// stored; assets already present in this version's namespace are
    /// skipped, making reinstall idempotent.
    ///
    /// # Errors
    ///
    /// Any fetch failure or non-cacheable response fails the install;
    /// a version with an incomplete shell must not activate.
    pub async fn install(&self, manifest: &Manifest) -> Result<u64, Error> {
        let mut stored = 0u64;

        for entry in &manifest.entries {
            let snapshot = RequestSnapshot::get(&entry.url);
            let descriptor = snapshot.descriptor()?;

            if self.db.get_entry(&self.policy, &descriptor.cache_key()).await?.is_some() {
                tracing::debug!(url = %entry.url, "precache entry already present, skipping");
                continue;
            }

            let response = self.gateway.send(&snapshot).await?;
            let cache_entry = entry_from_response(&descriptor, &self.policy.name, &response);
            if !self.db.put_entry(&self.policy, &cache_entry).await? {
                return Err(Error::HttpError(format!(
                    "precache fetch of {} returned status {}",
                    entry.url, response.status
                )));
            }

            tracing::debug!(url = %entry.url, revision = entry.revision.as_deref(), "precached");
            stored += 1;
        }

        tracing::info!(
            namespace = %self.policy.name,
            stored,
            total = manifest.entries.len(),
            "precache install complete"
        );
        Ok(stored)
    }

    /// Version rollover cleanup: delete every namespace not in `keep`
    /// (this version's own namespace is always kept). Returns the
    /// number of entries purged.
    pub async fn activate(&self, keep: &[String]) -> Result<u64, Error> {
        let mut keep = keep.to_vec();
        if !keep.contains(&self.policy.name) {
            keep.push(self.policy.name.clone());
        }
        let purged = self.db.purge_all_except(&keep).await?;
        tracing::info!(namespace = %self.policy.name, purged, "activated, superseded caches purged");
        Ok(purged)
    }

    /// The precached offline document, if present.
    pub async fn fallback(&self) -> Result<Option<ServedResponse>, Error> {
        let descriptor = RequestSnapshot::get(&self.fallback_url).descriptor()?;
        Ok(self
            .db
            .get_entry(&self.policy, &descriptor.cache_key())
            .await?
            .map(ServedResponse::from_entry))
    }
}
