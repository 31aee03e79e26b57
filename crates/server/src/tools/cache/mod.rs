//! Cache-related MCP tools.
//!
//! These operate on the worker's cache store directly, outside any strategy.

pub mod list;
pub mod purge;

pub use list::{CacheListParams, list_impl};
pub use purge::{CachePurgeParams, purge_impl};
