//! Page-side lifecycle controller for agent version updates.
//!
//! Tracks the update state machine:
//!
//! ```text
//! idle → waiting → (prompted | suppressed) → adopting → reloaded
//! ```
//!
//! A detected waiting version prompts immediately on first detection,
//! or shows a minimized indicator when the user dismissed a prompt
//! within the cooldown window. The dismissal timestamp is persisted so
//! the cooldown survives restarts; adoption clears it. A single-shot
//! guard reloads only on the controller-change transition, never on
//! repeated messages.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use furrow_core::store::StoreDb;
use furrow_core::Error;

use crate::events::{LifecycleEvent, PageMessage};

/// Metadata key holding the RFC 3339 timestamp of the last dismissal.
pub const DISMISSED_AT_KEY: &str = "update_dismissed_at";

/// Update state machine phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Prompted,
    Suppressed,
    Adopting,
    Reloaded,
}

/// What the hosting page should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// Show the full update prompt.
    ShowPrompt { version: String },
    /// Show the minimized update indicator.
    ShowBadge { version: String },
    /// Perform the one-time full reload.
    Reload,
}

/// Best-effort check for a newer agent version.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    async fn check(&self) -> Result<(), Error>;
}

/// Checker that asks the origin for the currently published agent
/// version. Reaching the endpoint is all that matters here; the
/// platform delivers a waiting version through the install path.
pub struct OriginUpdateCheck {
    gateway: std::sync::Arc<dyn furrow_engine::Gateway>,
    url: String,
}

impl OriginUpdateCheck {
    pub fn new(gateway: std::sync::Arc<dyn furrow_engine::Gateway>, url: impl Into<String>) -> Self {
        Self { gateway, url: url.into() }
    }
}

#[async_trait]
impl UpdateChecker for OriginUpdateCheck {
    async fn check(&self) -> Result<(), Error> {
        self.gateway
            .send(&furrow_engine::RequestSnapshot::get(&self.url))
            .await
            .map(|_| ())
    }
}

/// One best-effort poll for a newer version; failures are ignored.
pub async fn poll_once(checker: &dyn UpdateChecker) {
    if let Err(err) = checker.check().await {
        tracing::debug!(%err, "update check failed, ignoring");
    }
}

/// The page-side controller coordinating version hand-off.
pub struct LifecycleController {
    db: StoreDb,
    cooldown: Duration,
    phase: UpdatePhase,
    pending_version: Option<String>,
    reloaded: bool,
}

impl LifecycleController {
    pub fn new(db: StoreDb, cooldown: Duration) -> Self {
        Self { db, cooldown, phase: UpdatePhase::Idle, pending_version: None, reloaded: false }
    }

    pub fn phase(&self) -> &UpdatePhase {
        &self.phase
    }

    /// Handle a lifecycle event from the agent.
    pub async fn on_event(&mut self, event: &LifecycleEvent) -> Result<Option<ControllerAction>, Error> {
        match event {
            LifecycleEvent::Waiting { version } => {
                self.pending_version = Some(version.clone());
                if self.dismissed_recently().await? {
                    self.phase = UpdatePhase::Suppressed;
                    Ok(Some(ControllerAction::ShowBadge { version: version.clone() }))
                } else {
                    self.phase = UpdatePhase::Prompted;
                    Ok(Some(ControllerAction::ShowPrompt { version: version.clone() }))
                }
            }
            LifecycleEvent::Controlling { version } => {
                // reload exactly once, on the controller-change transition
                if self.phase == UpdatePhase::Adopting && !self.reloaded {
                    self.reloaded = true;
                    self.phase = UpdatePhase::Reloaded;
                    tracing::info!(%version, "new agent version took control, reloading");
                    Ok(Some(ControllerAction::Reload))
                } else {
                    Ok(None)
                }
            }
            LifecycleEvent::Activated { version } => {
                tracing::info!(%version, "agent version activated");
                Ok(None)
            }
        }
    }

    /// Record a prompt dismissal; the next detection within the
    /// cooldown shows the minimized indicator instead.
    pub async fn dismiss(&mut self) -> Result<(), Error> {
        self.db.set_meta(DISMISSED_AT_KEY, &Utc::now().to_rfc3339()).await?;
        if self.phase == UpdatePhase::Prompted {
            self.phase = UpdatePhase::Suppressed;
        }
        Ok(())
    }

    /// Accept the update. Clears the dismissal record and returns the
    /// message the page must send to the waiting agent instance.
    pub async fn adopt(&mut self) -> Result<Option<PageMessage>, Error> {
        if self.pending_version.is_none()
            || !matches!(self.phase, UpdatePhase::Prompted | UpdatePhase::Suppressed)
        {
            return Ok(None);
        }
        self.phase = UpdatePhase::Adopting;
        self.db.delete_meta(DISMISSED_AT_KEY).await?;
        Ok(Some(PageMessage::SkipWaiting))
    }

    async fn dismissed_recently(&self) -> Result<bool, Error> {
        let Some(stamp) = self.db.get_meta(DISMISSED_AT_KEY).await? else {
            return Ok(false);
        };
        let Ok(dismissed_at) = DateTime::parse_from_rfc3339(&stamp) else {
            // unreadable stamp: treat as never dismissed
            return Ok(false);
        };
        let elapsed = Utc::now().signed_duration_since(dismissed_at.with_timezone(&Utc));
        Ok(elapsed < chrono::Duration::seconds(self.cooldown.as_secs() as i64))
    }
}
