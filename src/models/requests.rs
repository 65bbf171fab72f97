//! Request DTOs for the cache admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::{PolicyKind, MAX_GROUP_LENGTH};

/// Request body for storing content (PUT /entries/:key)
///
/// # Fields
/// - `value`: The content to store
/// - `groups`: Groups the entry belongs to after this put
/// - `expires_in`: Optional seconds after which the entry needs a refresh,
///   regardless of the refresh period callers ask with
#[derive(Debug, Clone, Deserialize)]
pub struct PutEntryRequest {
    pub value: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl PutEntryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        for group in &self.groups {
            if group.is_empty() {
                return Some("Group names cannot be empty".to_string());
            }
            if group.len() > MAX_GROUP_LENGTH {
                return Some(format!(
                    "Group name exceeds maximum length of {} characters",
                    MAX_GROUP_LENGTH
                ));
            }
        }
        None
    }
}

/// Query string for lookups (GET /entries/:key)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetEntryQuery {
    /// Seconds, 0 always stale, negative never stale by time
    #[serde(default)]
    pub refresh_period: Option<i64>,
    /// Five-field cron expression for absolute-time expiry
    #[serde(default)]
    pub cron: Option<String>,
}

/// Request body for resizing or switching policy (PUT /capacity)
#[derive(Debug, Clone, Deserialize)]
pub struct CapacityRequest {
    pub capacity: usize,
    /// Replace the eviction policy as well
    #[serde(default)]
    pub policy: Option<PolicyKind>,
}
