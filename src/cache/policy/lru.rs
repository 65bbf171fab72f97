//! LRU Policy
//!
//! Implements Least Recently Used eviction.

use super::{EvictionPolicy, KeyOrder, PolicyKind};

// == LRU Policy ==
/// Evicts the key that has gone longest without a put or get.
#[derive(Debug)]
pub struct LruPolicy {
    order: KeyOrder,
    capacity: usize,
}

impl LruPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: KeyOrder::new(),
            capacity,
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn on_put(&mut self, key: &str) -> Option<String> {
        self.order.touch(key);
        self.order.evict_over(self.capacity, Some(key))
    }

    fn on_get(&mut self, key: &str) {
        // Reads of entries that were never put must not start tracking them
        if self.order.contains(key) {
            self.order.touch(key);
        }
    }

    fn on_remove(&mut self, key: &str) {
        self.order.remove(key);
    }

    fn evict(&mut self) -> Option<String> {
        self.order.evict_over(self.capacity, None)
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    fn tracked_keys(&self) -> Vec<String> {
        self.order.keys()
    }

    fn clear(&mut self) {
        self.order.clear();
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Lru
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_get_protects_key() {
        let mut policy = LruPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_get("a");

        assert_eq!(policy.on_put("c"), Some("b".to_string()));
        assert_eq!(policy.tracked_keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_lru_put_put_put_get_order() {
        // Put(a) Put(b) Put(c) Get(a) with capacity 2: next victim is b
        let mut policy = LruPolicy::new(2);

        assert_eq!(policy.on_put("a"), None);
        assert_eq!(policy.on_put("b"), None);
        assert_eq!(policy.on_put("c"), Some("a".to_string()));
        policy.on_get("a");

        assert_eq!(policy.tracked_keys(), vec!["b", "c"]);
        assert_eq!(policy.on_put("d"), Some("b".to_string()));
    }

    #[test]
    fn test_lru_put_refreshes_recency() {
        let mut policy = LruPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_put("a");

        assert_eq!(policy.on_put("c"), Some("b".to_string()));
    }

    #[test]
    fn test_lru_get_of_untracked_key_is_ignored() {
        let mut policy = LruPolicy::new(2);
        policy.on_get("ghost");
        assert!(policy.tracked_keys().is_empty());
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut policy = LruPolicy::new(10);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_put("c");

        policy.on_get("a");
        policy.on_get("c");
        policy.on_get("b");

        // Oldest to newest: a, c, b
        policy.set_capacity(0);
        assert_eq!(policy.evict(), Some("a".to_string()));
        assert_eq!(policy.evict(), Some("c".to_string()));
        assert_eq!(policy.evict(), Some("b".to_string()));
        assert_eq!(policy.evict(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut policy = LruPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_remove("b");

        assert_eq!(policy.on_put("c"), None);
        assert_eq!(policy.tracked_keys(), vec!["a", "c"]);
    }
}
