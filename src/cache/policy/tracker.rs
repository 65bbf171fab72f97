//! Key Order Tracker
//!
//! Ordered set of keys shared by the FIFO and LRU policies.

use std::collections::{BTreeMap, HashMap};

// == Key Order ==
/// Tracks keys in eviction order.
///
/// Every insert or touch stamps the key with a fresh sequence number:
/// - Lowest stamp = next eviction candidate (oldest / least recently used)
/// - Highest stamp = most recently inserted or touched
///
/// Pushes, touches and removals are O(log n).
#[derive(Debug, Default)]
pub struct KeyOrder {
    order: BTreeMap<u64, String>,
    stamps: HashMap<String, u64>,
    next: u64,
}

impl KeyOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Push Back ==
    /// Appends a key unless it is already tracked. Returns true if added.
    pub fn push_back(&mut self, key: &str) -> bool {
        if self.stamps.contains_key(key) {
            return false;
        }
        let stamp = self.stamp();
        self.stamps.insert(key.to_string(), stamp);
        self.order.insert(stamp, key.to_string());
        true
    }

    // == Touch ==
    /// Moves a key to the back, adding it if absent.
    pub fn touch(&mut self, key: &str) {
        let stamp = self.stamp();
        match self.stamps.get_mut(key) {
            Some(current) => {
                if let Some(owned) = self.order.remove(&*current) {
                    self.order.insert(stamp, owned);
                }
                *current = stamp;
            }
            None => {
                self.stamps.insert(key.to_string(), stamp);
                self.order.insert(stamp, key.to_string());
            }
        }
    }

    // == Remove ==
    /// Removes a key from the tracker. Returns true if it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.stamps.remove(key) {
            Some(stamp) => {
                self.order.remove(&stamp);
                true
            }
            None => false,
        }
    }

    // == Evict Over ==
    /// Pops the frontmost key other than `protect` while more than
    /// `capacity` keys are tracked.
    pub fn evict_over(&mut self, capacity: usize, protect: Option<&str>) -> Option<String> {
        if self.order.len() <= capacity {
            return None;
        }
        let stamp = self
            .order
            .iter()
            .find(|(_, key)| Some(key.as_str()) != protect)
            .map(|(stamp, _)| *stamp)?;
        let victim = self.order.remove(&stamp)?;
        self.stamps.remove(&victim);
        Some(victim)
    }

    // == Peek Oldest ==
    /// Returns the next eviction candidate without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.stamps.clear();
    }

    fn stamp(&mut self) -> u64 {
        let stamp = self.next;
        self.next += 1;
        stamp
    }
}
