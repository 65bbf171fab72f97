//! Cache Module
//!
//! Provides an in-process cache with refresh coordination, pluggable
//! eviction, group invalidation and cron-based expiry.

pub mod clock;
mod cron;
mod engine;
mod entry;
mod events;
mod groups;
pub mod policy;
mod stats;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use cron::{CronExpiry, CronExpression, CronParseError};
pub use engine::{CacheEngine, CacheEngineBuilder, Lookup, OriginScope, SharedRefreshPolicy};
pub use entry::{CacheEntry, ExpiresRefreshPolicy, RefreshPolicy, UpdateState, INDEFINITE_EXPIRY};
pub use events::{AccessKind, CacheEvent, NoopSink, NotificationSink, TracingSink};
pub use groups::GroupIndex;
pub use policy::{
    EvictionPolicy, FifoPolicy, LruPolicy, PolicyKind, UnlimitedPolicy, DEFAULT_CAPACITY,
};
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed group name length in bytes
pub const MAX_GROUP_LENGTH: usize = 128;
