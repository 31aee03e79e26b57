//! Named request->response caches.
//!
//! This module provides the [`CacheStore`] interface and its backends:
//!
//! - SQLite store via tokio-rusqlite with automatic schema migrations
//! - In-memory store for ephemeral workers and tests
//! - Versioned cache naming (`<prefix>-<role>-<suffix>`)
//! - Count and age based expiration

pub mod connection;
pub mod entries;
pub mod expiration;
pub mod memory;
pub mod migrations;
pub mod names;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use expiration::ExpirationPolicy;
pub use memory::MemoryStore;
pub use names::{CacheNames, PRECACHE_ROLE};
pub use store::{CacheEntry, CacheStore};
