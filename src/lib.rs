//! Refresh Cache - an in-process cache engine with refresh coordination
//!
//! Stale entries are rebuilt by exactly one caller while everyone else is
//! served the old content or waits. Eviction is pluggable (LRU, FIFO or
//! unbounded), entries can be invalidated by group, and an optional HTTP
//! surface exposes the engine for administration.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{CacheEngine, Lookup, PolicyKind};
pub use config::Config;
pub use error::{CacheError, Result};
