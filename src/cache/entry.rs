//! Cache Entry Module
//!
//! Defines the per-key record: cached content, refresh metadata and the
//! update state machine that coordinates who rebuilds stale content.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Refresh period meaning "never stale by time alone".
pub const INDEFINITE_EXPIRY: i64 = -1;

// == Update State ==
/// Where an entry is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Never populated, or nobody has claimed the refresh yet
    AwaitingUpdate,
    /// A caller owns the recomputation
    Updating,
    /// Content is valid as of the last update
    Complete,
    /// An in-flight update was abandoned
    Cancelled,
}

impl UpdateState {
    pub fn is_updating(self) -> bool {
        self == UpdateState::Updating
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateState::AwaitingUpdate => "awaiting update",
            UpdateState::Updating => "updating",
            UpdateState::Complete => "complete",
            UpdateState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// == Refresh Policy ==
/// Per-entry predicate that replaces the time-based staleness check.
pub trait RefreshPolicy<V>: Send + Sync {
    /// Returns true when `entry` must be rebuilt at `now_ms`.
    fn needs_refresh(&self, entry: &CacheEntry<V>, now_ms: u64) -> bool;
}

impl<V, F> RefreshPolicy<V> for F
where
    F: Fn(&CacheEntry<V>, u64) -> bool + Send + Sync,
{
    fn needs_refresh(&self, entry: &CacheEntry<V>, now_ms: u64) -> bool {
        self(entry, now_ms)
    }
}

/// Expires an entry a fixed period after its last update.
#[derive(Debug, Clone, Copy)]
pub struct ExpiresRefreshPolicy {
    period: Duration,
}

impl ExpiresRefreshPolicy {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl<V> RefreshPolicy<V> for ExpiresRefreshPolicy {
    fn needs_refresh(&self, entry: &CacheEntry<V>, now_ms: u64) -> bool {
        match entry.last_updated() {
            Some(last) => {
                let period_ms = u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX);
                now_ms >= last.saturating_add(period_ms)
            }
            None => true,
        }
    }
}

// == Cache Entry ==
/// A single cached key with its content and refresh metadata.
///
/// The entry itself does no locking; the engine keeps every entry behind
/// its own mutex and only mutates it through a held guard.
pub struct CacheEntry<V> {
    key: String,
    content: Option<V>,
    /// Creation timestamp (Unix milliseconds)
    created_at: u64,
    /// Last successful update (Unix milliseconds), None = never populated
    last_updated: Option<u64>,
    flushed: bool,
    groups: HashSet<String>,
    refresh_policy: Option<Arc<dyn RefreshPolicy<V>>>,
    update_state: UpdateState,
    /// Set once the entry has been dropped from the store
    removed: bool,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an empty entry awaiting its first update.
    pub fn new(key: impl Into<String>, created_at: u64) -> Self {
        Self {
            key: key.into(),
            content: None,
            created_at,
            last_updated: None,
            flushed: false,
            groups: HashSet::new(),
            refresh_policy: None,
            update_state: UpdateState::AwaitingUpdate,
            removed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> Option<&V> {
        self.content.as_ref()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_updated(&self) -> Option<u64> {
        self.last_updated
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn groups(&self) -> &HashSet<String> {
        &self.groups
    }

    pub fn update_state(&self) -> UpdateState {
        self.update_state
    }

    /// True until the entry has been populated for the first time.
    pub fn is_new(&self) -> bool {
        self.last_updated.is_none()
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed
    }

    // == State Transitions ==
    /// Claims the refresh for the calling thread.
    pub fn start_update(&mut self) -> Result<()> {
        if self.update_state == UpdateState::Updating {
            return Err(CacheError::InvalidState {
                action: "start an update on",
                state: self.update_state,
            });
        }
        self.update_state = UpdateState::Updating;
        Ok(())
    }

    /// Stores fresh content and returns whatever it replaced.
    pub fn complete_update(&mut self, content: V, now_ms: u64) -> Result<Option<V>> {
        if self.update_state != UpdateState::Updating {
            return Err(CacheError::InvalidState {
                action: "complete",
                state: self.update_state,
            });
        }
        let previous = self.content.replace(content);
        self.last_updated = Some(now_ms);
        self.flushed = false;
        self.update_state = UpdateState::Complete;
        Ok(previous)
    }

    /// Abandons the refresh, leaving stale content in place.
    pub fn cancel_update(&mut self) -> Result<()> {
        if self.update_state != UpdateState::Updating {
            return Err(CacheError::InvalidState {
                action: "cancel",
                state: self.update_state,
            });
        }
        self.update_state = UpdateState::Cancelled;
        Ok(())
    }

    // == Metadata ==
    pub fn flush(&mut self) {
        self.flushed = true;
    }

    pub(crate) fn set_groups(&mut self, groups: HashSet<String>) {
        self.groups = groups;
    }

    pub(crate) fn leave_group(&mut self, group: &str) {
        self.groups.remove(group);
    }

    pub(crate) fn set_refresh_policy(&mut self, policy: Option<Arc<dyn RefreshPolicy<V>>>) {
        self.refresh_policy = policy;
    }

    /// Marks the entry as dropped from the store and hands back its content.
    ///
    /// An in-flight update is cancelled so that waiters wake up and retry
    /// against the live store.
    pub(crate) fn retire(&mut self) -> Option<V> {
        self.removed = true;
        if self.update_state == UpdateState::Updating {
            self.update_state = UpdateState::Cancelled;
        }
        self.content.take()
    }

    // == Needs Refresh ==
    /// Checks whether the entry is stale for the given refresh period.
    ///
    /// `refresh_period` is in seconds: `0` is always stale, negative values
    /// never expire by time. An attached refresh policy replaces the time
    /// check entirely.
    pub fn needs_refresh(&self, refresh_period: i64, now_ms: u64) -> bool {
        let Some(last) = self.last_updated else {
            return true;
        };
        if self.flushed || refresh_period == 0 {
            return true;
        }
        if let Some(policy) = &self.refresh_policy {
            return policy.needs_refresh(self, now_ms);
        }
        refresh_period > 0
            && now_ms >= last.saturating_add((refresh_period as u64).saturating_mul(1000))
    }
}

impl<V: fmt::Debug> fmt::Debug for CacheEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("content", &self.content)
            .field("created_at", &self.created_at)
            .field("last_updated", &self.last_updated)
            .field("flushed", &self.flushed)
            .field("groups", &self.groups)
            .field("has_refresh_policy", &self.refresh_policy.is_some())
            .field("update_state", &self.update_state)
            .finish()
    }
}
