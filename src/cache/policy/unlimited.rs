//! Unlimited Policy
//!
//! Never evicts anything.

use super::{EvictionPolicy, PolicyKind};

/// Policy for caches bounded only by memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedPolicy;

impl UnlimitedPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl EvictionPolicy for UnlimitedPolicy {
    fn on_put(&mut self, _key: &str) -> Option<String> {
        None
    }

    fn on_get(&mut self, _key: &str) {}

    fn on_remove(&mut self, _key: &str) {}

    fn evict(&mut self) -> Option<String> {
        None
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn set_capacity(&mut self, _capacity: usize) {}

    fn tracked_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn clear(&mut self) {}

    fn kind(&self) -> PolicyKind {
        PolicyKind::Unlimited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_evicts() {
        let mut policy = UnlimitedPolicy::new();
        policy.set_capacity(1);

        for i in 0..10_000 {
            assert_eq!(policy.on_put(&format!("key{}", i)), None);
        }
        assert_eq!(policy.evict(), None);
        assert_eq!(policy.capacity(), None);
    }
}
