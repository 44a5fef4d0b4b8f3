//! Core types and shared functionality for the furrow offline engine.
//!
//! This crate provides:
//! - The persistent store (cache namespaces, sync queue, metadata)
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use store::{CacheEntry, NamespacePolicy, QueuedRequest, StoreDb};
