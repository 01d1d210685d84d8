//! Permission grants and their synthesis into ACL policies.

use super::acl::AclPolicy;
use super::capability::{Capability, CapabilitySet, Permission};
use super::naming;
use crate::domain::PathTemplates;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of principal a grant applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Group,
    Role,
    CiIdentity,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
            Self::CiIdentity => "ci_identity",
        }
    }
}

impl FromStr for PrincipalType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "role" => Ok(Self::Role),
            "ci_identity" | "ci-identity" => Ok(Self::CiIdentity),
            other => Err(Error::validation_field(
                format!("Unknown principal type: {}", other),
                "principal_type",
            )),
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(rename = "principal_type")]
    pub kind: PrincipalType,
}

impl Principal {
    pub fn new(kind: PrincipalType, id: impl Into<String>) -> Self {
        Self { id: id.into(), kind }
    }

    /// Name of the policy holding this principal's grant
    pub fn policy_name(&self) -> String {
        naming::principal_policy_name(self)
    }
}

/// Permissions on a tenant's secrets granted to one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    #[serde(flatten)]
    pub principal: Principal,
    /// Caller-visible permissions; never contains internal capabilities
    pub permissions: BTreeSet<Permission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
}

impl PermissionGrant {
    pub fn new(principal: Principal, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self { principal, permissions: permissions.into_iter().collect(), expired_at: None }
    }

    pub fn expiring_at(mut self, expired_at: DateTime<Utc>) -> Self {
        self.expired_at = Some(expired_at);
        self
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.principal.id.trim().is_empty() {
            return Err(Error::validation_field("Principal id cannot be empty", "principal_id"));
        }
        if self.permissions.is_empty() {
            return Err(Error::validation_field(
                "At least one permission must be granted",
                "permissions",
            ));
        }
        if let Some(expired_at) = self.expired_at {
            if expired_at <= now {
                return Err(Error::validation_field(
                    "Expiration must be in the future",
                    "expired_at",
                ));
            }
        }
        Ok(())
    }

    /// Capabilities written for this grant, including the internal ones
    pub fn effective_capabilities(&self) -> CapabilitySet {
        self.permissions
            .iter()
            .map(Permission::capability)
            .chain(Capability::internal())
            .collect()
    }

    /// Rebuild the caller-visible grant from a stored policy.
    ///
    /// Returns `None` when the policy holds nothing for the tenant's secrets.
    pub fn from_policy(
        principal: Principal,
        policy: &AclPolicy,
        templates: &PathTemplates,
    ) -> Option<Self> {
        let rule = policy.paths.get(&templates.metadata_path(WILDCARD))?;
        let permissions: BTreeSet<Permission> =
            rule.capabilities.iter().copied().filter_map(Permission::from_capability).collect();
        if permissions.is_empty() {
            return None;
        }
        Some(Self { principal, permissions, expired_at: rule.expiry })
    }
}

const WILDCARD: &str = "*";

/// Compute the policy granting `grant` on every secret under `templates`.
///
/// The data, metadata and detailed-metadata wildcard paths are fully
/// replaced: previous capabilities at those paths never survive a re-grant.
/// The data path never receives `read`; value reads go through the CI read
/// policies instead. Paths outside the three are kept untouched.
pub fn grant_to_policy(
    existing: Option<AclPolicy>,
    grant: &PermissionGrant,
    templates: &PathTemplates,
) -> AclPolicy {
    let mut policy = existing.unwrap_or_else(|| AclPolicy::new(grant.principal.policy_name()));

    let data_path = templates.data_path(WILDCARD);
    let metadata_path = templates.metadata_path(WILDCARD);
    let detailed_path = templates.detailed_metadata_path(WILDCARD);

    let capabilities = grant.effective_capabilities();

    let data: CapabilitySet =
        capabilities.iter().copied().filter(|c| *c != Capability::Read).collect();
    let metadata = capabilities.clone();
    let mut detailed = capabilities;
    detailed.insert(Capability::List);

    policy.set_path(data_path, data, grant.expired_at);
    policy.set_path(metadata_path, metadata, grant.expired_at);
    policy.set_path(detailed_path, detailed, grant.expired_at);
    policy
}

/// Remove every capability `grant_to_policy` could have written for `templates`
pub fn revoke_from_policy(mut policy: AclPolicy, templates: &PathTemplates) -> AclPolicy {
    policy.remove_path(&templates.data_path(WILDCARD));
    policy.remove_path(&templates.metadata_path(WILDCARD));
    policy.remove_path(&templates.detailed_metadata_path(WILDCARD));
    policy
}
