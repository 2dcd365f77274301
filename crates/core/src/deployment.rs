//! Immutable deployment inputs for one worker release.

use url::Url;

use crate::config::AppConfig;
use crate::identity::parse_scope;
use crate::policy::Policy;
use crate::{Error, GenerationId, PrecacheManifest};

/// What a release ships: its generation tag, scope, manifest and policy.
///
/// Built once at startup and shared read-only by the worker.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub current: GenerationId,
    pub scope: Url,
    pub manifest: PrecacheManifest,
    pub policy: Policy,
}

impl Deployment {
    pub fn new(current: GenerationId, scope: Url, manifest: PrecacheManifest, policy: Policy) -> Self {
        Self { current, scope, manifest, policy }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            current: GenerationId::new(config.cache_version.clone())?,
            scope: parse_scope(&config.scope)?,
            manifest: PrecacheManifest::new(config.manifest.iter().cloned()),
            policy: config.policy(),
        })
    }
}
