//! SQLite-backed persistent store for the offline engine.
//!
//! This module provides the durable state shared by every tab of the
//! origin, with async access via tokio-rusqlite. It holds:
//!
//! - Namespaced cache entries with per-namespace entry caps and TTLs
//! - The synchronization queue of failed mutating requests
//! - Agent metadata (dismissal timestamps, adopted version)
//!
//! Each operation is atomic on its own; no cross-operation transactions
//! exist or are needed.

pub mod connection;
pub mod entries;
pub mod key;
pub mod meta;
pub mod migrations;
pub mod queue;

pub use crate::Error;

pub use connection::StoreDb;
pub use entries::{CacheEntry, NamespacePolicy};
pub use queue::QueuedRequest;
