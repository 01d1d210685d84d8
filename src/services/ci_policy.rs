//! CI read policies for individual secrets.
//!
//! Every secret is readable by pipelines whose environment and branch match
//! its scope. The grant lives in the policy named by
//! [`ci_policy_name`]; glob-scoped policies must also be listed in the CI
//! auth role's token policies, since the role templates only resolve
//! concrete names.

use crate::domain::{Secret, TenantSecretsConfig};
use crate::errors::{Error, Result};
use crate::lease::{policy_scope, LeaseGuard, LeaseProvider};
use crate::policy::{ci_policy_name, glob_auth_policies, AclPolicy, Capability, CapabilitySet};
use crate::vault::SecretStore;
use std::sync::Arc;

/// Maintains CI read policies under the tenant's policy lease
#[derive(Clone)]
pub struct CiPolicyManager {
    leases: Arc<dyn LeaseProvider>,
}

impl CiPolicyManager {
    pub fn new(leases: Arc<dyn LeaseProvider>) -> Self {
        Self { leases }
    }

    /// Take the tenant's policy lease.
    ///
    /// Callers acquire it before their first store write and hold it until
    /// the CI policies are settled, so contention never strands a write.
    pub fn lease(&self, config: &TenantSecretsConfig) -> Result<LeaseGuard> {
        self.leases.try_acquire(&policy_scope(&config.tenant))
    }

    /// Grant CI reads on `secret`, then union glob policies into the role.
    ///
    /// If the policy write fails the role is left untouched.
    pub async fn attach(
        &self,
        _lease: &LeaseGuard,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        secret: &Secret,
    ) -> Result<()> {
        self.attach_locked(store, config, secret).await
    }

    /// Withdraw CI reads on `secret`
    pub async fn retract(
        &self,
        _lease: &LeaseGuard,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        secret: &Secret,
    ) -> Result<()> {
        self.retract_locked(store, config, secret).await
    }

    /// Move CI reads from `previous` scope to `current`
    pub async fn refresh(
        &self,
        _lease: &LeaseGuard,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        previous: &Secret,
        current: &Secret,
    ) -> Result<()> {
        let moved =
            previous.environment != current.environment || previous.branch != current.branch;
        if moved {
            self.retract_locked(store, config, previous).await?;
        }
        self.attach_locked(store, config, current).await
    }

    async fn attach_locked(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        secret: &Secret,
    ) -> Result<()> {
        let name = ci_policy_name(&config.mount, &secret.environment, &secret.branch);
        let mut policy = store.get_policy(&name).await?.unwrap_or_else(|| AclPolicy::new(&name));

        let read = CapabilitySet::from([Capability::Read]);
        policy.set_path(config.path_templates.data_path(&secret.name), read.clone(), None);
        policy.set_path(config.path_templates.metadata_path(&secret.name), read, None);
        store.set_policy(&policy).await?;

        let globs = glob_auth_policies(&config.mount, &secret.environment, &secret.branch);
        if globs.is_empty() {
            return Ok(());
        }

        let mut role = store.get_role(&config.auth_mount, &config.auth_role).await?.ok_or_else(
            || Error::not_found("auth_role", format!("{}/{}", config.auth_mount, config.auth_role)),
        )?;
        let missing: Vec<String> =
            globs.into_iter().filter(|name| !role.token_policies.contains(name)).collect();
        if missing.is_empty() {
            return Ok(());
        }

        role.token_policies.extend(missing);
        store.update_role(&config.auth_mount, &config.auth_role, &role).await?;
        tracing::info!(policy = %name, role = %config.auth_role, "Added glob policy to CI role");
        Ok(())
    }

    async fn retract_locked(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        secret: &Secret,
    ) -> Result<()> {
        let name = ci_policy_name(&config.mount, &secret.environment, &secret.branch);
        let Some(mut policy) = store.get_policy(&name).await? else {
            return Ok(());
        };

        policy.remove_path(&config.path_templates.data_path(&secret.name));
        policy.remove_path(&config.path_templates.metadata_path(&secret.name));

        if !policy.is_empty() {
            return store.set_policy(&policy).await;
        }

        store.delete_policy(&name).await?;
        let globs = glob_auth_policies(&config.mount, &secret.environment, &secret.branch);
        if globs.is_empty() {
            return Ok(());
        }

        if let Some(mut role) = store.get_role(&config.auth_mount, &config.auth_role).await? {
            let before = role.token_policies.len();
            role.token_policies.retain(|policy| !globs.contains(policy));
            if role.token_policies.len() != before {
                store.update_role(&config.auth_mount, &config.auth_role, &role).await?;
                tracing::info!(policy = %name, role = %config.auth_role, "Removed glob policy from CI role");
            }
        }
        Ok(())
    }
}
