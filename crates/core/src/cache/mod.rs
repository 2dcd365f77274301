//! SQLite-backed generation store.
//!
//! This module provides a persistent, generation-partitioned cache using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations, each holding its own entries
//! - Exact and query-insensitive request matching
//! - Atomic manifest population
//! - Whole-generation destruction with cascading entry removal

pub mod connection;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod precache;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::{GenerationId, GenerationInfo};
pub use store::{CacheEntry, CapturedResponse, MatchOptions, Store};
