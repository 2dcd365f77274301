//! Client code for offcache.
//!
//! This crate provides the HTTP implementation of the worker's network seam,
//! used by the server when precaching and filling misses.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
