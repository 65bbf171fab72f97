//! Cache Engine Module
//!
//! Main cache engine: the key -> entry store, staleness rules and the
//! refresh-coordination protocol, with eviction and group invalidation.
//!
//! Locking is two-tier. The store mutex guards the entry map, the group
//! index and the eviction policy, and is only held briefly. Every entry has
//! its own mutex and condition variable guarding its state transitions.
//! Locks are always taken store first, then entry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::cache::clock::{to_datetime, to_millis};
use crate::cache::{
    AccessKind, CacheEntry, CacheEvent, CacheStats, Clock, CronExpiry, EvictionPolicy,
    GroupIndex, NoopSink, NotificationSink, PolicyKind, RefreshPolicy, SystemClock,
    UpdateState, DEFAULT_CAPACITY, INDEFINITE_EXPIRY,
};
use crate::cache::stats::StatsRecorder;
use crate::error::{CacheError, Result};

/// Shared handle to a refresh policy.
pub type SharedRefreshPolicy<V> = Arc<dyn RefreshPolicy<V>>;

// == Lookup ==
/// Result of a `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<V> {
    /// Current content, possibly stale, None if never populated
    pub content: Option<V>,
    pub access: AccessKind,
    /// True when this caller now owns the refresh and must `put` or `cancel_update`
    pub owns_update: bool,
}

impl<V> Lookup<V> {
    fn new(content: Option<V>, access: AccessKind, owns_update: bool) -> Self {
        Self {
            content,
            access,
            owns_update,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.access == AccessKind::Hit
    }
}

// == Entry Slot ==
/// An entry together with the condition its waiters block on.
struct EntrySlot<V> {
    entry: Mutex<CacheEntry<V>>,
    updated: Condvar,
}

impl<V> EntrySlot<V> {
    fn new(key: &str, now_ms: u64) -> Self {
        Self {
            entry: Mutex::new(CacheEntry::new(key, now_ms)),
            updated: Condvar::new(),
        }
    }

    /// Detaches the entry for good and releases everyone waiting on it.
    fn retire(&self) -> Option<V> {
        let content = self.entry.lock().retire();
        self.updated.notify_all();
        content
    }
}

// == Store ==
struct Store<V> {
    entries: HashMap<String, Arc<EntrySlot<V>>>,
    groups: GroupIndex,
    policy: Box<dyn EvictionPolicy>,
}

impl<V> Store<V> {
    /// Removes a key from every structure. Returns None if it was absent,
    /// otherwise the content it held.
    fn detach(&mut self, key: &str) -> Option<Option<V>> {
        let slot = self.entries.remove(key)?;
        self.groups.remove_key(key);
        self.policy.on_remove(key);
        Some(slot.retire())
    }

    /// Returns the live slot for a key, inserting an empty one if needed.
    fn slot_or_insert(&mut self, key: &str, now_ms: u64) -> Arc<EntrySlot<V>> {
        if let Some(slot) = self.entries.get(key) {
            return Arc::clone(slot);
        }

        let slot = Arc::new(EntrySlot::new(key, now_ms));
        self.entries.insert(key.to_string(), Arc::clone(&slot));
        debug!(key, "Created cache entry");
        slot
    }

    /// Slots whose keys match, sorted by key.
    fn slots_where(&self, matches: impl Fn(&str) -> bool) -> Vec<(String, Arc<EntrySlot<V>>)> {
        let mut slots: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        slots
    }
}

// == Cache Engine ==
/// Thread-safe cache that hands exactly one caller the job of rebuilding
/// stale content.
pub struct CacheEngine<V> {
    store: Mutex<Store<V>>,
    /// Cache-wide flush time (Unix milliseconds)
    flushed_at: RwLock<Option<u64>>,
    blocking: bool,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

impl<V: Clone> CacheEngine<V> {
    // == Constructor ==
    /// Creates a non-blocking engine with the given policy and capacity.
    pub fn new(policy: PolicyKind, capacity: usize) -> Self {
        Self::builder().policy(policy).capacity(capacity).build()
    }

    pub fn builder() -> CacheEngineBuilder<V> {
        CacheEngineBuilder::default()
    }

    // == Get ==
    /// Looks up a key, coordinating refresh of stale content.
    ///
    /// `refresh_period` is in seconds (0 = always stale, negative = never
    /// stale by time). `cron` optionally adds absolute-time expiry.
    ///
    /// A result with `owns_update` set obliges the caller to either `put`
    /// fresh content or `cancel_update`. Blocks only when another caller
    /// owns the refresh and either blocking mode is on or the entry has
    /// never held content.
    pub fn get(
        &self,
        key: &str,
        refresh_period: i64,
        cron: Option<&dyn CronExpiry>,
    ) -> Result<Lookup<V>> {
        validate_key(key)?;

        let lookup = loop {
            let slot = self.slot_for(key);
            let mut entry = slot.entry.lock();
            if entry.is_removed() {
                continue;
            }

            if !self.is_stale(&entry, refresh_period, cron) {
                break Lookup::new(entry.content().cloned(), AccessKind::Hit, false);
            }

            if let Some(lookup) = self.resolve_stale(&slot, &mut entry)? {
                break lookup;
            }
        };

        self.stats.record_access(lookup.access);
        self.emit(CacheEvent::Accessed {
            key: key.to_string(),
            access: lookup.access,
        });
        Ok(lookup)
    }

    /// Decides what a caller that found stale content gets.
    ///
    /// Returns None if the entry was removed while waiting, in which case
    /// the lookup starts over against the live store.
    fn resolve_stale(
        &self,
        slot: &EntrySlot<V>,
        entry: &mut MutexGuard<'_, CacheEntry<V>>,
    ) -> Result<Option<Lookup<V>>> {
        let mut waited = false;
        loop {
            if entry.is_removed() {
                return Ok(None);
            }

            match entry.update_state() {
                UpdateState::Updating if self.blocking || entry.is_new() => {
                    slot.updated.wait(entry);
                    waited = true;
                }
                UpdateState::Updating => {
                    return Ok(Some(Lookup::new(
                        entry.content().cloned(),
                        AccessKind::StaleHit,
                        false,
                    )));
                }
                // Someone else finished the refresh we were waiting for
                UpdateState::Complete if waited => {
                    return Ok(Some(Lookup::new(
                        entry.content().cloned(),
                        AccessKind::Hit,
                        false,
                    )));
                }
                _ => {
                    entry.start_update()?;
                    let access = if entry.is_new() {
                        AccessKind::Miss
                    } else {
                        AccessKind::StaleHit
                    };
                    return Ok(Some(Lookup::new(entry.content().cloned(), access, true)));
                }
            }
        }
    }

    // == Put ==
    /// Stores content with no groups or refresh policy.
    pub fn put(&self, key: &str, content: V) -> Result<Option<V>> {
        self.put_from(key, content, &[], None, None)
    }

    /// Stores content, replacing the entry's groups and refresh policy.
    ///
    /// Completes any refresh in progress and wakes its waiters. Returns the
    /// content that was replaced.
    pub fn put_with(
        &self,
        key: &str,
        content: V,
        groups: &[&str],
        policy: Option<SharedRefreshPolicy<V>>,
    ) -> Result<Option<V>> {
        self.put_from(key, content, groups, policy, None)
    }

    fn put_from(
        &self,
        key: &str,
        content: V,
        groups: &[&str],
        policy: Option<SharedRefreshPolicy<V>>,
        origin: Option<&str>,
    ) -> Result<Option<V>> {
        validate_key(key)?;
        let groups: HashSet<String> = groups.iter().map(|g| g.to_string()).collect();
        let now = self.clock.now_ms();

        // The entry is written while the store lock is held, so a concurrent
        // remove either happens before (and the put re-adds the key) or after.
        let (slot, is_new, previous, evicted) = {
            let mut store = self.store.lock();
            let slot = store.slot_or_insert(key, now);
            let (is_new, previous) = populate(&slot, content, &groups, policy, now)?;
            store.groups.assign(key, &groups);
            let evicted = match store.policy.on_put(key) {
                Some(victim) => store.detach(&victim).map(|_| victim),
                None => None,
            };
            (slot, is_new, previous, evicted)
        };
        slot.updated.notify_all();

        if let Some(victim) = evicted {
            self.record_eviction(victim);
        }

        let key = key.to_string();
        let origin = origin.map(str::to_string);
        self.emit(if is_new {
            CacheEvent::EntryAdded { key, origin }
        } else {
            CacheEvent::EntryUpdated { key, origin }
        });

        Ok(previous)
    }

    // == Remove ==
    /// Removes an entry, returning its content.
    ///
    /// Anyone blocked on the entry wakes up and retries against the store.
    pub fn remove(&self, key: &str) -> Result<Option<V>> {
        self.remove_from(key, None)
    }

    fn remove_from(&self, key: &str, origin: Option<&str>) -> Result<Option<V>> {
        validate_key(key)?;

        let removed = self.store.lock().detach(key);
        let Some(content) = removed else {
            return Ok(None);
        };

        self.emit(CacheEvent::EntryRemoved {
            key: key.to_string(),
            origin: origin.map(str::to_string),
        });
        Ok(content)
    }

    // == Cancel Update ==
    /// Abandons an in-flight refresh so that a waiting caller can take over.
    ///
    /// A no-op when the key is absent or not being updated.
    ///
    /// An entry that never held content is dropped instead, so abandoned
    /// misses do not pile up outside the eviction policy. Its waiters start
    /// over and one of them claims a fresh entry.
    pub fn cancel_update(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let mut store = self.store.lock();
        let Some(slot) = store.entries.get(key).cloned() else {
            return Ok(());
        };

        let mut entry = slot.entry.lock();
        if !entry.update_state().is_updating() {
            return Ok(());
        }

        if entry.is_new() {
            drop(entry);
            store.detach(key);
            debug!(key, "Dropped unpopulated cache entry");
        } else {
            entry.cancel_update()?;
            drop(entry);
            drop(store);
            slot.updated.notify_all();
            debug!(key, "Cancelled cache update");
        }
        Ok(())
    }

    // == Flush ==
    /// Marks one entry stale without discarding its content.
    pub fn flush_entry(&self, key: &str) -> Result<()> {
        self.flush_entry_from(key, None)
    }

    fn flush_entry_from(&self, key: &str, origin: Option<&str>) -> Result<()> {
        validate_key(key)?;

        let Some(slot) = self.existing_slot(key) else {
            return Ok(());
        };
        slot.entry.lock().flush();

        self.emit(CacheEvent::EntryFlushed {
            key: key.to_string(),
            origin: origin.map(str::to_string),
        });
        Ok(())
    }

    /// Flushes every member of a group and forgets the group.
    ///
    /// Members that already need a refresh are left alone. A later `put`
    /// must name the group again to rejoin it. Returns the flushed keys,
    /// sorted.
    pub fn flush_group(&self, group: &str) -> Vec<String> {
        self.flush_group_from(group, None)
    }

    fn flush_group_from(&self, group: &str, origin: Option<&str>) -> Vec<String> {
        let slots = {
            let mut store = self.store.lock();
            let members = store.groups.take_group(group);
            let slots = store.slots_where(|key| members.contains(key));
            for (_, slot) in &slots {
                slot.entry.lock().leave_group(group);
            }
            slots
        };

        let now = self.clock.now_ms();
        let flushed: Vec<String> = slots
            .into_iter()
            .filter_map(|(key, slot)| {
                let mut entry = slot.entry.lock();
                if entry.needs_refresh(INDEFINITE_EXPIRY, now) {
                    return None;
                }
                entry.flush();
                Some(key)
            })
            .collect();

        debug!(group, flushed = flushed.len(), "Flushed cache group");
        let origin = origin.map(str::to_string);
        for key in &flushed {
            self.emit(CacheEvent::EntryFlushed {
                key: key.clone(),
                origin: origin.clone(),
            });
        }
        self.emit(CacheEvent::GroupFlushed {
            group: group.to_string(),
            origin,
        });
        flushed
    }

    /// Flushes every entry whose key contains `pattern`. Empty patterns are ignored.
    pub fn flush_pattern(&self, pattern: &str) {
        self.flush_pattern_from(pattern, None)
    }

    fn flush_pattern_from(&self, pattern: &str, origin: Option<&str>) {
        if pattern.is_empty() {
            return;
        }

        let slots = self.store.lock().slots_where(|key| key.contains(pattern));
        let origin = origin.map(str::to_string);
        for (key, slot) in slots {
            slot.entry.lock().flush();
            self.emit(CacheEvent::EntryFlushed {
                key,
                origin: origin.clone(),
            });
        }
        self.emit(CacheEvent::PatternFlushed {
            pattern: pattern.to_string(),
            origin,
        });
    }

    /// Marks everything last updated before `at` as stale.
    ///
    /// Entries are not visited; each one is checked on its next `get`.
    pub fn flush_all(&self, at: DateTime<Utc>) {
        self.flush_all_from(at, None)
    }

    fn flush_all_from(&self, at: DateTime<Utc>, origin: Option<&str>) {
        *self.flushed_at.write() = Some(to_millis(at));
        debug!(%at, "Flushed entire cache");
        self.emit(CacheEvent::CacheFlushed {
            at,
            origin: origin.map(str::to_string),
        });
    }

    // == Clear ==
    /// Removes every entry, group and tracked key.
    pub fn clear(&self) {
        self.clear_from(None)
    }

    fn clear_from(&self, origin: Option<&str>) {
        {
            let mut store = self.store.lock();
            store.groups.clear();
            store.policy.clear();
            for (_, slot) in store.entries.drain() {
                slot.retire();
            }
        }
        self.emit(CacheEvent::CacheCleared {
            origin: origin.map(str::to_string),
        });
    }

    // == Capacity & Policy ==
    /// Current capacity, None when the policy is unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.store.lock().policy.capacity()
    }

    /// Changes the capacity, evicting right away if the cache is now over it.
    pub fn set_capacity(&self, capacity: usize) {
        let victims = {
            let mut store = self.store.lock();
            store.policy.set_capacity(capacity);
            let mut victims = Vec::new();
            while let Some(victim) = store.policy.evict() {
                if store.detach(&victim).is_some() {
                    victims.push(victim);
                }
            }
            victims
        };

        for victim in victims {
            self.record_eviction(victim);
        }
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.store.lock().policy.kind()
    }

    /// Swaps the eviction policy, replaying populated keys into it.
    ///
    /// Keys keep the order the old policy tracked them in; keys it never
    /// tracked follow in key order. Anything over the new capacity is evicted.
    pub fn set_eviction_policy(&self, mut policy: Box<dyn EvictionPolicy>) {
        let victims = {
            let mut store = self.store.lock();

            let ordered: Vec<String> = store
                .policy
                .tracked_keys()
                .into_iter()
                .filter(|key| store.entries.contains_key(key))
                .collect();
            let known: HashSet<&str> = ordered.iter().map(String::as_str).collect();
            let mut untracked: Vec<String> = store
                .entries
                .iter()
                .filter(|(key, slot)| {
                    !known.contains(key.as_str()) && !slot.entry.lock().is_new()
                })
                .map(|(key, _)| key.clone())
                .collect();
            untracked.sort();

            let mut victims = Vec::new();
            for key in ordered.into_iter().chain(untracked) {
                if let Some(victim) = policy.on_put(&key) {
                    victims.push(victim);
                }
            }

            debug!(from = %store.policy.kind(), to = %policy.kind(), "Switched eviction policy");
            store.policy = policy;
            victims.retain(|victim| store.detach(victim).is_some());
            victims
        };

        for victim in victims {
            self.record_eviction(victim);
        }
    }

    // == Inspection ==
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total = self.len();
        self.stats.snapshot(total)
    }

    /// Number of entries, including ones still awaiting their first update.
    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.lock().entries.contains_key(key)
    }

    /// Update state of an entry, if present.
    pub fn update_state(&self, key: &str) -> Option<UpdateState> {
        let slot = self.existing_slot(key)?;
        let state = slot.entry.lock().update_state();
        Some(state)
    }

    /// Keys currently in a group, sorted.
    pub fn group_members(&self, group: &str) -> Vec<String> {
        let store = self.store.lock();
        let mut members: Vec<String> = store
            .groups
            .members(group)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Performs mutations on behalf of a named origin.
    pub fn with_origin<'a>(&'a self, origin: &'a str) -> OriginScope<'a, V> {
        OriginScope {
            engine: self,
            origin,
        }
    }

    // == Internals ==
    /// Finds the slot for a lookup, creating an empty one if needed. Reads
    /// of existing entries are reported to the eviction policy.
    fn slot_for(&self, key: &str) -> Arc<EntrySlot<V>> {
        let mut store = self.store.lock();
        if store.entries.contains_key(key) {
            store.policy.on_get(key);
        }
        store.slot_or_insert(key, self.clock.now_ms())
    }

    fn existing_slot(&self, key: &str) -> Option<Arc<EntrySlot<V>>> {
        self.store.lock().entries.get(key).cloned()
    }

    fn is_stale(
        &self,
        entry: &CacheEntry<V>,
        refresh_period: i64,
        cron: Option<&dyn CronExpiry>,
    ) -> bool {
        let now = self.clock.now_ms();
        if entry.needs_refresh(refresh_period, now) || self.is_flushed(entry) {
            return true;
        }

        let (Some(cron), Some(last)) = (cron, entry.last_updated()) else {
            return false;
        };
        match cron.has_more_recent_match_since(to_datetime(last), to_datetime(now)) {
            Ok(fired) => fired,
            Err(err) => {
                warn!(key = entry.key(), error = %err, "Ignoring unusable cron expiry");
                false
            }
        }
    }

    fn is_flushed(&self, entry: &CacheEntry<V>) -> bool {
        let flushed_at = *self.flushed_at.read();
        match (flushed_at, entry.last_updated()) {
            (Some(at), Some(updated)) => updated < at,
            _ => false,
        }
    }

    fn record_eviction(&self, key: String) {
        self.stats.record_eviction();
        debug!(key = %key, "Evicted cache entry");
        self.emit(CacheEvent::EntryRemoved { key, origin: None });
    }

    fn emit(&self, event: CacheEvent) {
        self.sink.notify(&event);
    }
}

impl<V> fmt::Debug for CacheEngine<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEngine")
            .field("blocking", &self.blocking)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Writes content into a live slot, claiming the update first if nobody
/// holds it. Returns whether the entry was new and the replaced content.
fn populate<V>(
    slot: &EntrySlot<V>,
    content: V,
    groups: &HashSet<String>,
    policy: Option<SharedRefreshPolicy<V>>,
    now_ms: u64,
) -> Result<(bool, Option<V>)> {
    let mut entry = slot.entry.lock();
    let is_new = entry.is_new();
    // Unsolicited puts are allowed
    if !entry.update_state().is_updating() {
        entry.start_update()?;
    }
    let previous = entry.complete_update(content, now_ms)?;
    entry.set_groups(groups.clone());
    entry.set_refresh_policy(policy);
    Ok((is_new, previous))
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

// == Origin Scope ==
/// Mutations tagged with the origin they were performed for, so that
/// listeners replaying remote changes can recognise their own echoes.
pub struct OriginScope<'a, V> {
    engine: &'a CacheEngine<V>,
    origin: &'a str,
}

impl<V: Clone> OriginScope<'_, V> {
    pub fn put_with(
        &self,
        key: &str,
        content: V,
        groups: &[&str],
        policy: Option<SharedRefreshPolicy<V>>,
    ) -> Result<Option<V>> {
        self.engine
            .put_from(key, content, groups, policy, Some(self.origin))
    }

    pub fn remove(&self, key: &str) -> Result<Option<V>> {
        self.engine.remove_from(key, Some(self.origin))
    }

    pub fn flush_entry(&self, key: &str) -> Result<()> {
        self.engine.flush_entry_from(key, Some(self.origin))
    }

    pub fn flush_group(&self, group: &str) -> Vec<String> {
        self.engine.flush_group_from(group, Some(self.origin))
    }

    pub fn flush_pattern(&self, pattern: &str) {
        self.engine.flush_pattern_from(pattern, Some(self.origin))
    }

    pub fn flush_all(&self, at: DateTime<Utc>) {
        self.engine.flush_all_from(at, Some(self.origin))
    }

    pub fn clear(&self) {
        self.engine.clear_from(Some(self.origin))
    }
}

// == Builder ==
/// Configures a [`CacheEngine`].
pub struct CacheEngineBuilder<V> {
    policy: Option<Box<dyn EvictionPolicy>>,
    kind: PolicyKind,
    capacity: usize,
    blocking: bool,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    _values: PhantomData<fn() -> V>,
}

impl<V> Default for CacheEngineBuilder<V> {
    fn default() -> Self {
        Self {
            policy: None,
            kind: PolicyKind::Lru,
            capacity: DEFAULT_CAPACITY,
            blocking: false,
            sink: Arc::new(NoopSink),
            clock: Arc::new(SystemClock),
            _values: PhantomData,
        }
    }
}

impl<V> CacheEngineBuilder<V> {
    pub fn policy(mut self, kind: PolicyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Uses a custom policy; overrides `policy` and `capacity`.
    pub fn eviction_policy(mut self, policy: Box<dyn EvictionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Makes every caller wait for an in-flight refresh instead of taking stale content.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> CacheEngine<V> {
        let policy = self
            .policy
            .unwrap_or_else(|| self.kind.build(self.capacity));

        CacheEngine {
            store: Mutex::new(Store {
                entries: HashMap::new(),
                groups: GroupIndex::new(),
                policy,
            }),
            flushed_at: RwLock::new(None),
            blocking: self.blocking,
            sink: self.sink,
            clock: self.clock,
            stats: StatsRecorder::default(),
        }
    }
}
