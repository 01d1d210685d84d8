//! Explicit construction of tenant-scoped store clients.

use super::http::VaultClient;
use super::store::SecretStore;
use crate::domain::TenantSecretsConfig;
use crate::errors::Result;
use std::sync::Arc;

/// Produces store clients scoped to a tenant's namespace.
///
/// Services receive a factory instead of a shared client so each call is
/// explicitly scoped; nothing is cached across tenants.
pub trait StoreFactory: Send + Sync {
    fn store_for(&self, config: &TenantSecretsConfig) -> Result<Arc<dyn SecretStore>>;
}

/// Re-scopes one root [`VaultClient`] per tenant
#[derive(Debug, Clone)]
pub struct VaultClientFactory {
    root: VaultClient,
}

impl VaultClientFactory {
    pub fn new(root: VaultClient) -> Self {
        Self { root }
    }

    /// Namespace for a tenant, nested under the root client's namespace
    pub fn tenant_namespace(&self, config: &TenantSecretsConfig) -> String {
        let tenant = config.full_namespace_path();
        match self.root.namespace() {
            Some(root) if !tenant.is_empty() => format!("{}/{}", root.trim_end_matches('/'), tenant),
            Some(root) => root.to_string(),
            None => tenant,
        }
    }
}

impl StoreFactory for VaultClientFactory {
    fn store_for(&self, config: &TenantSecretsConfig) -> Result<Arc<dyn SecretStore>> {
        Ok(Arc::new(self.root.with_namespace(self.tenant_namespace(config))))
    }
}
