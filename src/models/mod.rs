//! Request and Response models for the cache admin API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{CapacityRequest, GetEntryQuery, PutEntryRequest};
pub use responses::{
    CacheActionResponse, CapacityResponse, EntryResponse, GroupResponse, HealthResponse,
    KeyActionResponse, PutEntryResponse, StatsResponse,
};
