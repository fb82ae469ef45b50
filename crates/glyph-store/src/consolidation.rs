//! Alias resolution for redundant glyph names.
//!
//! The consolidation map redirects duplicate names to a canonical identity.
//! Nothing guarantees the stored redirects are acyclic, so resolution stops
//! after one hop.

use std::collections::HashMap;

use log::warn;

/// Redirect map from redundant glyph names to their canonical identity.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationMap {
    redirects: HashMap<String, String>,
}

impl ConsolidationMap {
    pub fn new(redirects: HashMap<String, String>) -> Self {
        Self { redirects }
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    /// Resolve a name through the map, following at most one redirect.
    ///
    /// A target that itself redirects is left as-is and logged; this is how
    /// cyclic chains terminate.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        match self.redirects.get(name) {
            Some(merged) => {
                if merged != name && self.redirects.contains_key(merged.as_str()) {
                    warn!(
                        "consolidation target {merged:?} itself redirects; \
                         stopping after one hop from {name:?}"
                    );
                }
                merged
            }
            None => name,
        }
    }
}
