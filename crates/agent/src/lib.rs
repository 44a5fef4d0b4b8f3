//! The furrow background agent.
//!
//! This crate hosts the agent's event loop plus the surfaces the
//! hosting application embeds: the precache manager, the notification
//! pipeline, the page-side lifecycle controller, and the default
//! routing policy.

pub mod agent;
pub mod events;
pub mod lifecycle;
pub mod notifications;
pub mod precache;
pub mod rules;

pub use agent::Agent;
pub use events::{AgentEvent, AgentNotice, LifecycleEvent, PageMessage};
pub use lifecycle::{ControllerAction, LifecycleController, UpdatePhase};
pub use precache::{Manifest, ManifestEntry, PrecacheManager};
