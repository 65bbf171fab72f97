//! Response DTOs for the cache admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{AccessKind, CacheStats, Lookup, PolicyKind};

/// Response body for lookups (GET /entries/:key)
///
/// When `owns_update` is true the client must follow up with a PUT or a
/// cancel, or other readers of the key stay on stale content.
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    pub key: String,
    /// Current content, null if the entry never held any
    pub value: Option<String>,
    pub access: AccessKind,
    pub owns_update: bool,
}

impl EntryResponse {
    pub fn new(key: impl Into<String>, lookup: Lookup<String>) -> Self {
        Self {
            key: key.into(),
            value: lookup.content,
            access: lookup.access,
            owns_update: lookup.owns_update,
        }
    }
}

/// Response body for storing content (PUT /entries/:key)
#[derive(Debug, Clone, Serialize)]
pub struct PutEntryResponse {
    /// Success message
    pub message: String,
    /// The key that was stored
    pub key: String,
    /// Whether earlier content was replaced
    pub replaced: bool,
}

impl PutEntryResponse {
    pub fn new(key: impl Into<String>, replaced: bool) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            key,
            replaced,
        }
    }
}

/// Response body for single-key actions (remove, cancel, flush)
#[derive(Debug, Clone, Serialize)]
pub struct KeyActionResponse {
    /// Success message
    pub message: String,
    /// The key acted on
    pub key: String,
}

impl KeyActionResponse {
    fn new(key: impl Into<String>, action: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' {} successfully", key, action),
            key,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self::new(key, "removed")
    }

    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::new(key, "update cancelled")
    }

    pub fn flushed(key: impl Into<String>) -> Self {
        Self::new(key, "flushed")
    }
}

/// Response body for group inspection and flushes
#[derive(Debug, Clone, Serialize)]
pub struct GroupResponse {
    pub group: String,
    /// Member keys, sorted. For a flush, only the keys that were flushed
    pub members: Vec<String>,
}

/// Response body for cache-wide actions (POST /flush, DELETE /entries)
#[derive(Debug, Clone, Serialize)]
pub struct CacheActionResponse {
    pub message: String,
    /// When the action took effect, in ISO 8601 format
    pub at: String,
}

impl CacheActionResponse {
    pub fn flushed(at: DateTime<Utc>) -> Self {
        Self {
            message: "Cache flushed successfully".to_string(),
            at: at.to_rfc3339(),
        }
    }

    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared successfully".to_string(),
            at: Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for the capacity endpoint (GET/PUT /capacity)
#[derive(Debug, Clone, Serialize)]
pub struct CapacityResponse {
    pub policy: PolicyKind,
    /// Null for unbounded policies
    pub capacity: Option<usize>,
    pub total_entries: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of lookups served fresh content
    pub hits: u64,
    /// Number of lookups that found content needing a refresh
    pub stale_hits: u64,
    /// Number of lookups for entries that never held content
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / all lookups)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            stale_hits: stats.stale_hits,
            misses: stats.misses,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_response_serialize() {
        let lookup = Lookup {
            content: Some("v".to_string()),
            access: AccessKind::StaleHit,
            owns_update: true,
        };
        let json = serde_json::to_value(EntryResponse::new("k", lookup)).unwrap();
        assert_eq!(json["key"], "k");
        assert_eq!(json["value"], "v");
        assert_eq!(json["access"], "stale_hit");
        assert_eq!(json["owns_update"], true);
    }

    #[test]
    fn test_miss_serializes_null_value() {
        let lookup = Lookup {
            content: None,
            access: AccessKind::Miss,
            owns_update: true,
        };
        let json = serde_json::to_value(EntryResponse::new("k", lookup)).unwrap();
        assert!(json["value"].is_null());
    }

    #[test]
    fn test_key_action_messages() {
        assert!(KeyActionResponse::removed("a").message.contains("removed"));
        assert!(KeyActionResponse::cancelled("a").message.contains("cancelled"));
        assert!(KeyActionResponse::flushed("a").message.contains("flushed"));
    }

    #[test]
    fn test_stats_response_from_stats() {
        let stats = CacheStats {
            hits: 6,
            stale_hits: 2,
            misses: 2,
            evictions: 1,
            total_entries: 4,
        };
        let resp = StatsResponse::from(stats);
        assert!((resp.hit_rate - 0.6).abs() < 0.001);
        assert_eq!(resp.stale_hits, 2);
    }

    #[test]
    fn test_capacity_response_unbounded() {
        let resp = CapacityResponse {
            policy: PolicyKind::Unlimited,
            capacity: None,
            total_entries: 0,
        };
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["policy"], "unlimited");
        assert!(json["capacity"].is_null());
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
