//! Request interception for shellcache.
//!
//! This crate provides the fetch transport, route table, caching strategies,
//! precache and worker lifecycle shared by the server.

pub mod fetch;
pub mod lifecycle;
pub mod precache;
pub mod routing;
pub mod strategy;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fetch::{FetchClient, FetchConfig, Method, Network, Request, RequestMode};
pub use lifecycle::{ActivationReport, ControlMessage, Event, EventOutcome, InstallSummary, LifecycleState, Worker};
pub use precache::{InstallReport, PrecacheController, PrecacheManifest};
pub use routing::{Route, RouteMatcher, Router};
pub use strategy::{Outcome, ResponseSource, Strategy};
