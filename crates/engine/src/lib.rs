//! Request routing and synchronization engine.
//!
//! This crate provides the offline-resilient core shared by the
//! background agent: the HTTP gateway, URL normalization, the routing
//! rule table with its strategy executors, and the synchronization
//! queue that replays failed mutations.

pub mod fetch;
pub mod request;
pub mod routing;
pub mod strategy;
pub mod sync;

pub use fetch::{FetchedResponse, Gateway, GatewayConfig, HttpGateway};
pub use request::{RequestDescriptor, RequestSnapshot};
pub use routing::{Plugin, RoutePattern, Router, RoutingRule, RuleTable};
pub use strategy::{ResponseSource, ServedResponse, StrategyKind};
pub use sync::{ReplayReport, SyncQueue};
