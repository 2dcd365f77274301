//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache server.

pub mod cache;
