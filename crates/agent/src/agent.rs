//! The background agent event loop.
//!
//! One agent instance serves every open page of the origin. It owns the
//! router, the sync queue, and the precache manager; pages interact
//! with it only through asynchronous message passing. Events are
//! handled run-to-completion on a single task, which is what makes each
//! store operation safe under interleaved page traffic without locks.

use furrow_core::store::StoreDb;
use furrow_core::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::events::{AgentEvent, AgentNotice, LifecycleEvent, PageMessage};
use crate::notifications;
use crate::precache::PrecacheManager;
use furrow_engine::Router;

/// Metadata key recording which version last took control.
pub const ADOPTED_VERSION_KEY: &str = "adopted_version";

/// The background agent for one origin.
pub struct Agent {
    version: String,
    origin: Url,
    db: StoreDb,
    router: Router,
    precache: PrecacheManager,
    outbound: mpsc::Sender<AgentNotice>,
    online: bool,
    adopted: bool,
}

impl Agent {
    pub fn new(
        version: impl Into<String>, origin: Url, db: StoreDb, router: Router, precache: PrecacheManager,
        outbound: mpsc::Sender<AgentNotice>,
    ) -> Self {
        Self {
            version: version.into(),
            origin,
            db,
            router,
            precache,
            outbound,
            online: true,
            adopted: false,
        }
    }

    /// Install this version, announce it as waiting, then consume
    /// events until the channel closes.
    ///
    /// # Errors
    ///
    /// Only a failed install aborts the agent; a version without its
    /// complete shell must not serve traffic. Per-event failures are
    /// logged and the loop continues.
    pub async fn run(
        mut self, manifest: &crate::precache::Manifest, mut events: mpsc::Receiver<AgentEvent>,
    ) -> Result<(), Error> {
        self.precache.install(manifest).await?;
        self.notify(AgentNotice::Lifecycle(LifecycleEvent::Waiting { version: self.version.clone() }))
            .await;

        // opportunistic TTL sweep over the runtime namespaces
        for policy in self.router.table().namespaces() {
            if let Err(err) = self.db.sweep_expired(policy).await {
                tracing::warn!(namespace = %policy.name, %err, "expiry sweep failed");
            }
        }

        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }

        tracing::info!("event channel closed, agent stopping");
        Ok(())
    }

    async fn handle(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Fetch { request, reply } => {
                let mut result = self.router.dispatch(&request).await;

                // a failed document request falls back to the precached
                // offline page when nothing else resolved it
                if result.is_err() && request.is_document() {
                    match self.precache.fallback().await {
                        Ok(Some(fallback)) => {
                            tracing::debug!(url = %request.url, "serving offline fallback document");
                            result = Ok(fallback);
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(%err, "offline fallback lookup failed"),
                    }
                }

                // the requesting page may have navigated away
                let _ = reply.send(result);
            }
            AgentEvent::ConnectivityChanged { online } => {
                let was_online = std::mem::replace(&mut self.online, online);
                if online && !was_online {
                    tracing::info!("connectivity restored, replaying sync queue");
                    match self.router.queue().replay(self.router.gateway()).await {
                        Ok(report) => tracing::info!(
                            replayed = report.replayed,
                            failed = report.failed,
                            expired = report.expired,
                            "sync queue replay finished"
                        ),
                        Err(err) => tracing::error!(%err, "sync queue replay failed"),
                    }
                }
            }
            AgentEvent::Push { payload } => match notifications::validate(&payload) {
                Ok(valid) => {
                    let rendered = notifications::display(&self.origin, &valid);
                    self.notify(AgentNotice::ShowNotification(rendered)).await;
                }
                Err(err) => {
                    tracing::debug!(%err, "malformed push payload dropped");
                }
            },
            AgentEvent::Page(PageMessage::SkipWaiting) => {
                if let Err(err) = self.take_control().await {
                    tracing::error!(%err, "activation failed");
                }
            }
        }
    }

    /// Stop waiting: take control of pages and run rollover cleanup.
    async fn take_control(&mut self) -> Result<(), Error> {
        if self.adopted {
            return Ok(());
        }
        self.adopted = true;

        self.notify(AgentNotice::Lifecycle(LifecycleEvent::Controlling { version: self.version.clone() }))
            .await;

        let keep: Vec<String> = self
            .router
            .table()
            .namespaces()
            .iter()
            .map(|policy| policy.name.clone())
            .collect();
        self.precache.activate(&keep).await?;
        self.db.set_meta(ADOPTED_VERSION_KEY, &self.version).await?;

        self.notify(AgentNotice::Lifecycle(LifecycleEvent::Activated { version: self.version.clone() }))
            .await;
        Ok(())
    }

    async fn notify(&self, notice: AgentNotice) {
        if self.outbound.send(notice).await.is_err() {
            tracing::debug!("no page listening, notice dropped");
        }
    }
}
