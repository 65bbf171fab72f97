//! Cache Events Module
//!
//! Typed notifications the engine emits, and the sink it emits them into.
//! Fan-out to multiple listeners is left to whoever implements the sink.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

// == Access Kind ==
/// Outcome of a `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Fresh content was served
    Hit,
    /// The entry has never held content
    Miss,
    /// Content exists but needs refreshing
    StaleHit,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessKind::Hit => "hit",
            AccessKind::Miss => "miss",
            AccessKind::StaleHit => "stale_hit",
        };
        f.write_str(name)
    }
}

// == Cache Event ==
/// Everything observable about the engine, in emission order.
///
/// `origin` names the node or component a mutation was performed for, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    EntryAdded {
        key: String,
        origin: Option<String>,
    },
    EntryUpdated {
        key: String,
        origin: Option<String>,
    },
    EntryRemoved {
        key: String,
        origin: Option<String>,
    },
    EntryFlushed {
        key: String,
        origin: Option<String>,
    },
    GroupFlushed {
        group: String,
        origin: Option<String>,
    },
    PatternFlushed {
        pattern: String,
        origin: Option<String>,
    },
    CacheFlushed {
        at: DateTime<Utc>,
        origin: Option<String>,
    },
    CacheCleared {
        origin: Option<String>,
    },
    Accessed {
        key: String,
        access: AccessKind,
    },
}

// == Notification Sink ==
/// Receives events synchronously, in order, with no engine locks held.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &CacheEvent);
}

impl<F> NotificationSink for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn notify(&self, event: &CacheEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: &CacheEvent) {}
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Accessed { key, access } => debug!(%key, %access, "cache access"),
            CacheEvent::CacheFlushed { at, origin } => {
                debug!(%at, ?origin, "cache flushed")
            }
            other => debug!(event = ?other, "cache event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_events() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &CacheEvent| seen.lock().unwrap().push(event.clone());

        sink.notify(&CacheEvent::CacheCleared { origin: None });
        sink.notify(&CacheEvent::Accessed {
            key: "k".into(),
            access: AccessKind::Miss,
        });

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_access_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AccessKind::StaleHit).unwrap();
        assert_eq!(json, "\"stale_hit\"");
        assert_eq!(AccessKind::StaleHit.to_string(), "stale_hit");
    }
}
