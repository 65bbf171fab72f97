//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::cache::{PolicyKind, DEFAULT_CAPACITY, INDEFINITE_EXPIRY};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries for bounded policies
    pub capacity: usize,
    /// Eviction algorithm
    pub algorithm: PolicyKind,
    /// Whether every caller waits for an in-flight refresh
    pub blocking: bool,
    /// Refresh period in seconds used when a request does not give one
    pub default_refresh_period: i64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `CACHE_ALGORITHM` - `lru`, `fifo` or `unlimited` (default: lru)
    /// - `CACHE_BLOCKING` - Wait for in-flight refreshes (default: false)
    /// - `DEFAULT_REFRESH_PERIOD` - Seconds, -1 never expires (default: -1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable values fall back to their default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: parse_var("CACHE_CAPACITY", defaults.capacity),
            algorithm: parse_var("CACHE_ALGORITHM", defaults.algorithm),
            blocking: parse_var("CACHE_BLOCKING", defaults.blocking),
            default_refresh_period: parse_var(
                "DEFAULT_REFRESH_PERIOD",
                defaults.default_refresh_period,
            ),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            algorithm: PolicyKind::Lru,
            blocking: false,
            default_refresh_period: INDEFINITE_EXPIRY,
            server_port: 3000,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let Ok(raw) = env::var(name) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(variable = name, value = %raw, "Ignoring unparseable configuration value");
        default
    })
}
