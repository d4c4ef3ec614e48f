//! SQLite-backed versioned response store.
//!
//! Responses live in generations, one per application release, so a new
//! release can be staged completely before any request is served from it.
//! Access is async via tokio-rusqlite. The module provides:
//!
//! - Request keys normalized by SHA-256 over method and fragment-free URL
//! - Generations with exact-match lookup and last-write-wins puts
//! - A transactional batch write for all-or-nothing installs
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::Generation;
pub use key::RequestKey;
