//! Eviction Policies
//!
//! Pluggable strategies deciding which key leaves the cache when it grows
//! past capacity. Policies only ever see keys, never values.

mod fifo;
mod lru;
mod tracker;
mod unlimited;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use tracker::KeyOrder;
pub use unlimited::UnlimitedPolicy;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1000;

// == Eviction Policy Trait ==
/// Callbacks the engine drives on every store access.
///
/// The engine calls these while holding its store lock, so implementations
/// never need their own synchronization.
pub trait EvictionPolicy: Send + fmt::Debug {
    /// Records an insert or update and returns a key to evict, never `key` itself.
    fn on_put(&mut self, key: &str) -> Option<String>;

    /// Records a read of an existing entry.
    fn on_get(&mut self, key: &str);

    /// Forgets a key that left the store.
    fn on_remove(&mut self, key: &str);

    /// Returns one key to evict while more keys are tracked than allowed.
    fn evict(&mut self) -> Option<String>;

    /// Maximum number of tracked keys, None = unbounded.
    fn capacity(&self) -> Option<usize>;

    fn set_capacity(&mut self, capacity: usize);

    /// Tracked keys in eviction order.
    fn tracked_keys(&self) -> Vec<String>;

    /// Drops all tracking state.
    fn clear(&mut self);

    fn kind(&self) -> PolicyKind;
}

// == Policy Kind ==
/// Named policy variants, used for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Unlimited,
    Fifo,
    Lru,
}

impl PolicyKind {
    /// Builds a fresh policy of this kind.
    pub fn build(self, capacity: usize) -> Box<dyn EvictionPolicy> {
        match self {
            PolicyKind::Unlimited => Box::new(UnlimitedPolicy::new()),
            PolicyKind::Fifo => Box::new(FifoPolicy::new(capacity)),
            PolicyKind::Lru => Box::new(LruPolicy::new(capacity)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Unlimited => "unlimited",
            PolicyKind::Fifo => "fifo",
            PolicyKind::Lru => "lru",
        };
        f.write_str(name)
    }
}

impl FromStr for PolicyKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlimited" => Ok(PolicyKind::Unlimited),
            "fifo" => Ok(PolicyKind::Fifo),
            "lru" => Ok(PolicyKind::Lru),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("LRU".parse::<PolicyKind>().unwrap(), PolicyKind::Lru);
        assert_eq!(" fifo ".parse::<PolicyKind>().unwrap(), PolicyKind::Fifo);
        assert_eq!(
            "unlimited".parse::<PolicyKind>().unwrap(),
            PolicyKind::Unlimited
        );
        assert!(matches!(
            "random".parse::<PolicyKind>(),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_reports_kind_and_capacity() {
        for kind in [PolicyKind::Unlimited, PolicyKind::Fifo, PolicyKind::Lru] {
            let policy = kind.build(10);
            assert_eq!(policy.kind(), kind);
            assert_eq!(kind.to_string().parse::<PolicyKind>().unwrap(), kind);
        }
        assert_eq!(PolicyKind::Lru.build(10).capacity(), Some(10));
        assert_eq!(PolicyKind::Unlimited.build(10).capacity(), None);
    }
}
