//! ACL policy documents: named mappings of store path to capabilities.

use super::capability::{Capability, CapabilitySet};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capabilities and optional expiry attached to one path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub capabilities: CapabilitySet,
    #[serde(rename = "expiration", default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    path: BTreeMap<String, PathRule>,
}

/// A named ACL policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclPolicy {
    pub name: String,
    pub paths: BTreeMap<String, PathRule>,
}

impl AclPolicy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), paths: BTreeMap::new() }
    }

    /// Replace every capability at `path` with `capabilities`
    pub fn set_path(
        &mut self,
        path: impl Into<String>,
        capabilities: CapabilitySet,
        expiry: Option<DateTime<Utc>>,
    ) {
        self.paths.insert(path.into(), PathRule { capabilities, expiry });
    }

    /// Clear all capabilities at `path` without removing the entry
    pub fn clear_path(&mut self, path: &str) {
        if let Some(rule) = self.paths.get_mut(path) {
            rule.capabilities.clear();
        }
    }

    pub fn add_capability(&mut self, path: &str, capability: Capability) {
        self.paths.entry(path.to_string()).or_default().capabilities.insert(capability);
    }

    pub fn remove_path(&mut self, path: &str) -> Option<PathRule> {
        self.paths.remove(path)
    }

    pub fn capabilities(&self, path: &str) -> Option<&CapabilitySet> {
        self.paths.get(path).map(|rule| &rule.capabilities)
    }

    /// Drop paths whose capability set is empty
    pub fn prune(&mut self) {
        self.paths.retain(|_, rule| !rule.capabilities.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.values().all(|rule| rule.capabilities.is_empty())
    }

    /// Render the policy body in the store's JSON policy syntax
    pub fn to_document(&self) -> Result<String> {
        let document = PolicyDocument { path: self.paths.clone() };
        serde_json::to_string(&document)
            .map_err(|e| Error::serialization(e, format!("Failed to render policy '{}'", self.name)))
    }

    /// Parse a policy body as returned by the store.
    ///
    /// Unknown capability strings are rejected.
    pub fn from_document(name: impl Into<String>, document: &str) -> Result<Self> {
        let name = name.into();
        if document.trim().is_empty() {
            return Ok(Self::new(name));
        }
        let parsed: PolicyDocument = serde_json::from_str(document)
            .map_err(|e| Error::serialization(e, format!("Failed to parse policy '{}'", name)))?;
        Ok(Self { name, paths: parsed.path })
    }
}
