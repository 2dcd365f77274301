//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Generation store with SQLite backend
//! - Interception policy and the cache worker driving it
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod deployment;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod network;
pub mod policy;
pub mod worker;

pub use cache::{CacheDb, CacheEntry, CapturedResponse, GenerationId, GenerationInfo, MatchOptions, Store};
pub use config::{AppConfig, ConfigError};
pub use deployment::Deployment;
pub use error::Error;
pub use identity::RequestIdentity;
pub use manifest::PrecacheManifest;
pub use network::Network;
pub use policy::{Policy, PolicyPreset};
pub use worker::{ActivationReport, CacheWorker, FetchOutcome, InstallReport, WorkerState};
