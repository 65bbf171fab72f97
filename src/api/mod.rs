//! API Module
//!
//! HTTP handlers and routing for the cache admin REST API.
//!
//! # Endpoints
//! - `/entries/:key` - Look up, store and remove entries
//! - `/entries/:key/cancel`, `/entries/:key/flush` - Refresh control
//! - `/groups/:group` - Group inspection and invalidation
//! - `/flush`, `/capacity`, `/stats`, `/health` - Cache-wide administration

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
