//! Group Index Module
//!
//! Maps group names to the keys tagged with them, for bulk invalidation.

use std::collections::{HashMap, HashSet};

// == Group Index ==
/// Many-to-many index between group names and keys.
///
/// A reverse map of key -> groups is kept so that a key's memberships can be
/// reconciled without scanning every group.
#[derive(Debug, Default)]
pub struct GroupIndex {
    groups: HashMap<String, HashSet<String>>,
    memberships: HashMap<String, HashSet<String>>,
}

impl GroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Assign ==
    /// Makes `groups` the exact set of groups `key` belongs to.
    ///
    /// Memberships the key no longer has are dropped before new ones are
    /// added, and groups left without members are removed.
    pub fn assign(&mut self, key: &str, groups: &HashSet<String>) {
        let previous = self.memberships.remove(key).unwrap_or_default();

        for stale in previous.difference(groups) {
            self.detach(stale, key);
        }

        for group in groups {
            self.groups
                .entry(group.clone())
                .or_default()
                .insert(key.to_string());
        }

        if !groups.is_empty() {
            self.memberships.insert(key.to_string(), groups.clone());
        }
    }

    // == Take Group ==
    /// Removes a group and returns its members.
    pub fn take_group(&mut self, group: &str) -> HashSet<String> {
        let members = self.groups.remove(group).unwrap_or_default();
        for key in &members {
            if let Some(groups) = self.memberships.get_mut(key) {
                groups.remove(group);
                if groups.is_empty() {
                    self.memberships.remove(key);
                }
            }
        }
        members
    }

    // == Remove Key ==
    /// Drops a key from every group it belongs to.
    pub fn remove_key(&mut self, key: &str) {
        if let Some(groups) = self.memberships.remove(key) {
            for group in &groups {
                self.detach(group, key);
            }
        }
    }

    pub fn members(&self, group: &str) -> Option<&HashSet<String>> {
        self.groups.get(group)
    }

    pub fn groups_of(&self, key: &str) -> Option<&HashSet<String>> {
        self.memberships.get(key)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.memberships.clear();
    }

    fn detach(&mut self, group: &str, key: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(key);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }
}
