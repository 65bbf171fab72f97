//! API Handlers
//!
//! HTTP request handlers for each cache admin endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use crate::cache::{
    CacheEngine, CronExpiry, ExpiresRefreshPolicy, SharedRefreshPolicy, TracingSink,
    MAX_KEY_LENGTH,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CacheActionResponse, CapacityRequest, CapacityResponse, EntryResponse, GetEntryQuery,
    GroupResponse, HealthResponse, KeyActionResponse, PutEntryRequest, PutEntryResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
///
/// The engine synchronizes internally, so it is shared through a bare `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheEngine<String>>,
    /// Refresh period for lookups that do not name one
    pub default_refresh_period: i64,
}

impl AppState {
    /// Creates a new AppState around an engine.
    pub fn new(cache: CacheEngine<String>, default_refresh_period: i64) -> Self {
        Self {
            cache: Arc::new(cache),
            default_refresh_period,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Cache events are logged through tracing.
    pub fn from_config(config: &Config) -> Self {
        let cache = CacheEngine::builder()
            .policy(config.algorithm)
            .capacity(config.capacity)
            .blocking(config.blocking)
            .sink(TracingSink)
            .build();
        Self::new(cache, config.default_refresh_period)
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Handler for GET /entries/:key
///
/// Looks the key up, possibly handing the caller the refresh. Runs on the
/// blocking pool since the lookup may wait for another caller's refresh.
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetEntryQuery>,
) -> Result<Json<EntryResponse>> {
    check_key(&key)?;
    let refresh_period = query
        .refresh_period
        .unwrap_or(state.default_refresh_period);

    let cache = Arc::clone(&state.cache);
    let lookup_key = key.clone();
    let lookup = tokio::task::spawn_blocking(move || {
        let cron = query.cron.as_ref().map(|cron| cron as &dyn CronExpiry);
        cache.get(&lookup_key, refresh_period, cron)
    })
    .await
    .map_err(|err| CacheError::Internal(err.to_string()))??;

    Ok(Json(EntryResponse::new(key, lookup)))
}

/// Handler for PUT /entries/:key
///
/// Stores content, completing any refresh in progress for the key.
pub async fn put_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutEntryRequest>,
) -> Result<Json<PutEntryResponse>> {
    check_key(&key)?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let policy = req.expires_in.map(|secs| -> SharedRefreshPolicy<String> {
        Arc::new(ExpiresRefreshPolicy::new(Duration::from_secs(secs)))
    });
    let groups: Vec<&str> = req.groups.iter().map(String::as_str).collect();
    let previous = state.cache.put_with(&key, req.value, &groups, policy)?;

    Ok(Json(PutEntryResponse::new(key, previous.is_some())))
}

/// Handler for DELETE /entries/:key
pub async fn remove_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyActionResponse>> {
    check_key(&key)?;
    match state.cache.remove(&key)? {
        Some(_) => Ok(Json(KeyActionResponse::removed(key))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for POST /entries/:key/cancel
///
/// Gives up a refresh obtained from a lookup.
pub async fn cancel_update_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyActionResponse>> {
    check_key(&key)?;
    state.cache.cancel_update(&key)?;
    Ok(Json(KeyActionResponse::cancelled(key)))
}

/// Handler for POST /entries/:key/flush
pub async fn flush_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyActionResponse>> {
    check_key(&key)?;
    state.cache.flush_entry(&key)?;
    Ok(Json(KeyActionResponse::flushed(key)))
}

/// Handler for DELETE /entries
pub async fn clear_handler(State(state): State<AppState>) -> Json<CacheActionResponse> {
    state.cache.clear();
    Json(CacheActionResponse::cleared())
}

/// Handler for GET /groups/:group
pub async fn group_members_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Json<GroupResponse> {
    let members = state.cache.group_members(&group);
    Json(GroupResponse { group, members })
}

/// Handler for POST /groups/:group/flush
///
/// Responds with the members that were flushed. Members that were already
/// stale are left out.
pub async fn flush_group_handler(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Json<GroupResponse> {
    let members = state.cache.flush_group(&group);
    Json(GroupResponse { group, members })
}

/// Handler for POST /flush
///
/// Everything updated before now becomes stale.
pub async fn flush_all_handler(State(state): State<AppState>) -> Json<CacheActionResponse> {
    let at = Utc::now();
    state.cache.flush_all(at);
    Json(CacheActionResponse::flushed(at))
}

/// Handler for GET /capacity
pub async fn capacity_handler(State(state): State<AppState>) -> Json<CapacityResponse> {
    Json(capacity_response(&state.cache))
}

/// Handler for PUT /capacity
///
/// Resizes the cache, optionally switching eviction policy. Excess entries
/// are evicted before the response is sent.
pub async fn set_capacity_handler(
    State(state): State<AppState>,
    Json(req): Json<CapacityRequest>,
) -> Json<CapacityResponse> {
    match req.policy {
        Some(kind) => state.cache.set_eviction_policy(kind.build(req.capacity)),
        None => state.cache.set_capacity(req.capacity),
    }
    Json(capacity_response(&state.cache))
}

fn capacity_response(cache: &CacheEngine<String>) -> CapacityResponse {
    CapacityResponse {
        policy: cache.policy_kind(),
        capacity: cache.capacity(),
        total_entries: cache.len(),
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
