//! API Routes
//!
//! Configures the Axum router with all cache admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cancel_update_handler, capacity_handler, clear_handler, flush_all_handler,
    flush_entry_handler, flush_group_handler, get_entry_handler, group_members_handler,
    health_handler, put_entry_handler, remove_entry_handler, set_capacity_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /entries/:key` - Look up a key (`refresh_period`, `cron` query parameters)
/// - `PUT /entries/:key` - Store content, with optional groups and expiry
/// - `DELETE /entries/:key` - Remove a key
/// - `POST /entries/:key/cancel` - Give up a refresh obtained from a lookup
/// - `POST /entries/:key/flush` - Mark a key stale
/// - `DELETE /entries` - Remove everything
/// - `GET /groups/:group` - List group members
/// - `POST /groups/:group/flush` - Mark every member of a group stale
/// - `POST /flush` - Mark everything stale
/// - `GET /capacity` / `PUT /capacity` - Inspect or change capacity and policy
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/entries", delete(clear_handler))
        .route(
            "/entries/:key",
            get(get_entry_handler)
                .put(put_entry_handler)
                .delete(remove_entry_handler),
        )
        .route("/entries/:key/cancel", post(cancel_update_handler))
        .route("/entries/:key/flush", post(flush_entry_handler))
        .route("/groups/:group", get(group_members_handler))
        .route("/groups/:group/flush", post(flush_group_handler))
        .route("/flush", post(flush_all_handler))
        .route("/capacity", get(capacity_handler).put(set_capacity_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
