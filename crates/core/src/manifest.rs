//! Precache manifest: the ordered locator list an install must capture.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, RequestIdentity};

/// Ordered list of locators supplied by deployment tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecacheManifest(Vec<String>);

impl PrecacheManifest {
    pub fn new<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(locators.into_iter().map(Into::into).collect())
    }

    pub fn locators(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve every locator against `scope`, preserving order.
    ///
    /// Two locators resolving to the same identity are rejected, since an
    /// install could otherwise not tell which capture wins.
    pub fn resolve(&self, scope: &Url) -> Result<Vec<RequestIdentity>, Error> {
        let mut seen = HashSet::with_capacity(self.0.len());
        let mut requests = Vec::with_capacity(self.0.len());

        for locator in &self.0 {
            let identity = RequestIdentity::resolve(scope, locator)?;
            if !seen.insert(identity.as_str().to_string()) {
                return Err(Error::InvalidInput(format!("duplicate manifest entry: {identity}")));
            }
            requests.push(identity);
        }

        Ok(requests)
    }
}
