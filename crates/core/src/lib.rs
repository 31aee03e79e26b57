//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Cache store interface with SQLite and in-memory backends
//! - Versioned cache naming and expiration policy
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod response;

pub use cache::{CacheDb, CacheEntry, CacheNames, CacheStore, ExpirationPolicy, MemoryStore};
pub use config::AppConfig;
pub use error::Error;
pub use response::HttpResponse;
