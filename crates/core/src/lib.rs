//! Core types and shared functionality for larder.
//!
//! This crate provides:
//! - Versioned response cache with SQLite backend
//! - Request/response model shared across crates
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, Generation, RequestKey};
pub use config::AppConfig;
pub use error::Error;
pub use model::{ResourceRequest, StoredResponse};
