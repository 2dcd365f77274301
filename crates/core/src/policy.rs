//! Interception policy.
//!
//! Every release of the worker is the same decision procedure with different
//! switches. The presets name the four shipped combinations:
//!
//! | Preset | Lookup            | On miss                 | On activate            |
//! |--------|-------------------|-------------------------|------------------------|
//! | `v1`   | exact             | no response             | nothing                |
//! | `v2`   | exact             | fetch and store         | nothing                |
//! | `v3`   | exact             | fetch and store         | nothing                |
//! | `v4`   | ignores query     | no response             | drop stale generations |
//!
//! `v2` and `v3` differ only in the manifest they ship with, which is
//! configuration rather than policy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cache::MatchOptions;

/// Named policy release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    V1,
    V2,
    V3,
    #[default]
    V4,
}

impl PolicyPreset {
    pub fn policy(self) -> Policy {
        match self {
            Self::V1 => Policy { ignore_search: false, network_fill: false, purge_stale: false },
            Self::V2 | Self::V3 => Policy { ignore_search: false, network_fill: true, purge_stale: false },
            Self::V4 => Policy { ignore_search: true, network_fill: false, purge_stale: true },
        }
    }
}

/// Switches governing fetch and activate handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Policy {
    /// Match stored entries while ignoring the request's query string.
    pub ignore_search: bool,
    /// On a miss, fetch from the network and write the response through.
    pub network_fill: bool,
    /// On activate, destroy every generation other than the current one.
    pub purge_stale: bool,
}

impl Default for Policy {
    fn default() -> Self {
        PolicyPreset::default().policy()
    }
}

impl Policy {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions { ignore_search: self.ignore_search }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_is_lookup_only() {
        let policy = PolicyPreset::V1.policy();
        assert!(!policy.network_fill);
        assert!(!policy.ignore_search);
        assert!(!policy.purge_stale);
    }

    #[test]
    fn test_v2_and_v3_share_behavior() {
        assert_eq!(PolicyPreset::V2.policy(), PolicyPreset::V3.policy());
        assert!(PolicyPreset::V2.policy().network_fill);
    }

    #[test]
    fn test_default_is_v4() {
        let policy = Policy::default();
        assert!(policy.ignore_search);
        assert!(!policy.network_fill);
        assert!(policy.purge_stale);
        assert!(policy.match_options().ignore_search);
    }

    #[test]
    fn test_preset_serde_names() {
        let preset: PolicyPreset = serde_json::from_str("\"v2\"").unwrap();
        assert_eq!(preset, PolicyPreset::V2);
    }
}
