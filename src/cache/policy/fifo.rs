//! FIFO Policy
//!
//! Evicts keys in insertion order; reads never reorder.

use super::{EvictionPolicy, KeyOrder, PolicyKind};

// == FIFO Policy ==
/// First-in, first-out eviction.
#[derive(Debug)]
pub struct FifoPolicy {
    order: KeyOrder,
    capacity: usize,
}

impl FifoPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: KeyOrder::new(),
            capacity,
        }
    }
}

impl EvictionPolicy for FifoPolicy {
    fn on_put(&mut self, key: &str) -> Option<String> {
        // Updates keep their original slot
        self.order.push_back(key);
        self.order.evict_over(self.capacity, Some(key))
    }

    fn on_get(&mut self, _key: &str) {}

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
        PolicyKind::Fifo
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_evicts_oldest_insert() {
        let mut policy = FifoPolicy::new(2);

        assert_eq!(policy.on_put("a"), None);
        assert_eq!(policy.on_put("b"), None);
        assert_eq!(policy.on_put("c"), Some("a".to_string()));
        assert_eq!(policy.tracked_keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_fifo_access_does_not_reorder() {
        let mut policy = FifoPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_get("a");

        assert_eq!(policy.on_put("c"), Some("a".to_string()));
    }

    #[test]
    fn test_fifo_update_keeps_position() {
        let mut policy = FifoPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        assert_eq!(policy.on_put("a"), None);

        assert_eq!(policy.on_put("c"), Some("a".to_string()));
    }

    #[test]
    fn test_fifo_remove_forgets_key() {
        let mut policy = FifoPolicy::new(2);

        policy.on_put("a");
        policy.on_put("b");
        policy.on_remove("a");
        policy.on_remove("missing");

        assert_eq!(policy.on_put("c"), None);
        assert_eq!(policy.tracked_keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_fifo_shrink_then_evict() {
        let mut policy = FifoPolicy::new(3);
        policy.on_put("a");
        policy.on_put("b");
        policy.on_put("c");

        policy.set_capacity(1);
        assert_eq!(policy.evict(), Some("a".to_string()));
        assert_eq!(policy.evict(), Some("b".to_string()));
        assert_eq!(policy.evict(), None);
    }
}
