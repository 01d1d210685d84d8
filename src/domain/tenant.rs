//! Tenant identity and the tenant's presence in the secret store.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default KV-v2 mount inside a tenant namespace
pub const DEFAULT_SECRETS_MOUNT: &str = "secrets/kv";

/// Default JWT auth engine mount for CI tokens
pub const DEFAULT_AUTH_MOUNT: &str = "pipeline_jwt";

/// Default auth role every pipeline logs in with
pub const DEFAULT_AUTH_ROLE: &str = "all_pipelines";

/// Prefix under which user-defined secrets live inside the mount
const EXPLICIT_PREFIX: &str = "explicit";

/// Placeholder replaced by the secret name in path templates
const NAME_PLACEHOLDER: &str = "{name}";

/// Kind of tenant owning a secrets configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Project,
    Group,
}

impl TenantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Group => "group",
        }
    }

    /// Claim a CI token carries to identify this kind of tenant
    pub fn bound_claim(&self) -> &'static str {
        match self {
            Self::Project => "project_id",
            Self::Group => "namespace_id",
        }
    }
}

impl FromStr for TenantKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "group" => Ok(Self::Group),
            _ => Err(format!("Unknown tenant kind: {}", s)),
        }
    }
}

impl fmt::Display for TenantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a project or group owning secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId {
    pub kind: TenantKind,
    pub id: i64,
}

impl TenantId {
    pub fn project(id: i64) -> Self {
        Self { kind: TenantKind::Project, id }
    }

    pub fn group(id: i64) -> Self {
        Self { kind: TenantKind::Group, id }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

/// Policy path templates for a mount, parameterized by secret name.
///
/// Each template contains `{name}`; passing `*` yields the wildcard path
/// covering every secret in the mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplates {
    pub data: String,
    pub metadata: String,
    pub detailed_metadata: String,
}

impl PathTemplates {
    pub fn for_mount(mount: &str) -> Self {
        let mount = mount.trim_matches('/');
        Self {
            data: format!("{mount}/data/{EXPLICIT_PREFIX}/{NAME_PLACEHOLDER}"),
            metadata: format!("{mount}/metadata/{EXPLICIT_PREFIX}/{NAME_PLACEHOLDER}"),
            detailed_metadata: format!(
                "{mount}/detailed-metadata/{EXPLICIT_PREFIX}/{NAME_PLACEHOLDER}"
            ),
        }
    }

    pub fn data_path(&self, name: &str) -> String {
        self.data.replace(NAME_PLACEHOLDER, name)
    }

    pub fn metadata_path(&self, name: &str) -> String {
        self.metadata.replace(NAME_PLACEHOLDER, name)
    }

    pub fn detailed_metadata_path(&self, name: &str) -> String {
        self.detailed_metadata.replace(NAME_PLACEHOLDER, name)
    }
}

/// One tenant's presence in the secret store.
///
/// Created once per tenant, mutated only by provisioning (the `active` flag),
/// never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSecretsConfig {
    pub tenant: TenantId,
    /// Namespace of the tenant's top-level owner, e.g. `group_7` or `user_3`
    pub namespace_path: String,
    /// Tenant segment nested under `namespace_path`, e.g. `project_42`
    pub tenant_path: String,
    /// KV-v2 mount holding the tenant's secrets
    pub mount: String,
    pub path_templates: PathTemplates,
    pub auth_mount: String,
    pub auth_role: String,
    pub active: bool,
}

impl TenantSecretsConfig {
    /// Build an inactive configuration with the default mounts.
    pub fn new(tenant: TenantId, namespace_path: impl Into<String>) -> Self {
        let namespace_path = namespace_path.into();
        let tenant_path = match tenant.kind {
            TenantKind::Project => tenant.to_string(),
            // a group is its own top-level namespace
            TenantKind::Group => String::new(),
        };

        Self {
            tenant,
            namespace_path,
            tenant_path,
            mount: DEFAULT_SECRETS_MOUNT.to_string(),
            path_templates: PathTemplates::for_mount(DEFAULT_SECRETS_MOUNT),
            auth_mount: DEFAULT_AUTH_MOUNT.to_string(),
            auth_role: DEFAULT_AUTH_ROLE.to_string(),
            active: false,
        }
    }

    /// Namespace every tenant-scoped store call is made in
    pub fn full_namespace_path(&self) -> String {
        [self.namespace_path.as_str(), self.tenant_path.as_str()]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Mount-relative path of a secret, as used by the KV API
    pub fn secret_path(&self, name: &str) -> String {
        format!("{EXPLICIT_PREFIX}/{name}")
    }

    /// Mount-relative directory listing every secret
    pub fn secrets_prefix(&self) -> String {
        format!("{EXPLICIT_PREFIX}/")
    }

    /// Short-circuit with [`Error::InactiveConfig`] unless provisioning completed
    pub fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::inactive(self.tenant.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_display() {
        assert_eq!(TenantId::project(42).to_string(), "project_42");
        assert_eq!(TenantId::group(7).to_string(), "group_7");
        assert_eq!("group".parse::<TenantKind>().unwrap(), TenantKind::Group);
        assert!("user".parse::<TenantKind>().is_err());
    }

    #[test]
    fn test_path_templates() {
        let templates = PathTemplates::for_mount("/secrets/kv/");
        assert_eq!(templates.data_path("db"), "secrets/kv/data/explicit/db");
        assert_eq!(templates.metadata_path("*"), "secrets/kv/metadata/explicit/*");
        assert_eq!(
            templates.detailed_metadata_path("*"),
            "secrets/kv/detailed-metadata/explicit/*"
        );
    }

    #[test]
    fn test_namespaces() {
        let project = TenantSecretsConfig::new(TenantId::project(42), "group_7");
        assert_eq!(project.full_namespace_path(), "group_7/project_42");
        assert_eq!(project.secret_path("db"), "explicit/db");

        let group = TenantSecretsConfig::new(TenantId::group(7), "group_7");
        assert_eq!(group.full_namespace_path(), "group_7");
    }

    #[test]
    fn test_ensure_active() {
        let mut config = TenantSecretsConfig::new(TenantId::project(1), "user_1");
        let err = config.ensure_active().unwrap_err();
        assert!(matches!(err, Error::InactiveConfig { ref tenant } if tenant == "project_1"));

        config.active = true;
        assert!(config.ensure_active().is_ok());
    }
}
