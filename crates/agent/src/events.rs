//! Message protocol between pages and the background agent.
//!
//! The channel is deliberately narrow: exactly one recognized inbound
//! message and three recognized outbound lifecycle events, plus the
//! platform signals (fetch, connectivity, push) the agent consumes.

use furrow_core::Error;
use furrow_engine::{RequestSnapshot, ServedResponse};
use tokio::sync::oneshot;

use crate::notifications::Notification;

/// Inbound page → agent messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMessage {
    /// Tell the waiting agent version to take control now.
    SkipWaiting,
}

/// Outbound agent → page lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A new version finished installing and is parked.
    Waiting { version: String },
    /// The new version has taken control of open pages.
    Controlling { version: String },
    /// Activation (version rollover cleanup) completed.
    Activated { version: String },
}

/// Everything the agent pushes out to its pages.
#[derive(Debug, Clone)]
pub enum AgentNotice {
    Lifecycle(LifecycleEvent),
    ShowNotification(Notification),
}

/// The events the agent's run-to-completion loop consumes.
#[derive(Debug)]
pub enum AgentEvent {
    /// A page issued a request; the response goes back on `reply`.
    Fetch {
        request: RequestSnapshot,
        reply: oneshot::Sender<Result<ServedResponse, Error>>,
    },
    /// The platform's online/offline transition.
    ConnectivityChanged { online: bool },
    /// An untrusted push payload from the push service.
    Push { payload: serde_json::Value },
    /// A message from a page.
    Page(PageMessage),
}
