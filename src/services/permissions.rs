//! Principal permission grants on a tenant's secrets.

use crate::domain::TenantSecretsConfig;
use crate::errors::{Error, Result};
use crate::lease::{policy_scope, LeaseProvider};
use crate::policy::{grant_to_policy, revoke_from_policy, PermissionGrant, Principal};
use crate::tenant_span;
use crate::vault::StoreFactory;
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

/// Persists [`PermissionGrant`]s as principal policies.
///
/// Every policy read-modify-write runs under the tenant's exclusive lease;
/// contention is returned to the caller rather than waited out.
pub struct SecretPermissionService {
    stores: Arc<dyn StoreFactory>,
    leases: Arc<dyn LeaseProvider>,
}

impl SecretPermissionService {
    pub fn new(stores: Arc<dyn StoreFactory>, leases: Arc<dyn LeaseProvider>) -> Self {
        Self { stores, leases }
    }

    /// Replace the principal's permissions on the tenant's secrets.
    ///
    /// Returns the grant as stored, without internal capabilities.
    pub async fn update(
        &self,
        config: &TenantSecretsConfig,
        grant: PermissionGrant,
    ) -> Result<PermissionGrant> {
        grant.validate(Utc::now())?;
        config.ensure_active()?;

        let policy_name = grant.principal.policy_name();
        let span = tenant_span!("update_permissions", config.tenant, policy = %policy_name);
        async move {
            let store = self.stores.store_for(config)?;
            let _lease = self.leases.try_acquire(&policy_scope(&config.tenant))?;

            let existing = store.get_policy(&policy_name).await?;
            let policy = grant_to_policy(existing, &grant, &config.path_templates);
            store.set_policy(&policy).await?;
            tracing::info!(permissions = ?grant.permissions, "Updated secret permissions");

            PermissionGrant::from_policy(grant.principal.clone(), &policy, &config.path_templates)
                .ok_or_else(|| Error::internal(format!("Policy '{}' lost its grant", policy_name)))
        }
        .instrument(span)
        .await
    }

    /// Current grant of a principal, `None` when it has none
    pub async fn get(
        &self,
        config: &TenantSecretsConfig,
        principal: &Principal,
    ) -> Result<Option<PermissionGrant>> {
        config.ensure_active()?;
        let store = self.stores.store_for(config)?;
        let policy = store.get_policy(&principal.policy_name()).await?;
        Ok(policy.and_then(|policy| {
            PermissionGrant::from_policy(principal.clone(), &policy, &config.path_templates)
        }))
    }

    /// Remove the principal's permissions; returns whether any existed.
    ///
    /// The principal's policy is deleted once nothing else is left in it.
    pub async fn revoke(&self, config: &TenantSecretsConfig, principal: &Principal) -> Result<bool> {
        config.ensure_active()?;

        let policy_name = principal.policy_name();
        let span = tenant_span!("revoke_permissions", config.tenant, policy = %policy_name);
        async move {
            let store = self.stores.store_for(config)?;
            let _lease = self.leases.try_acquire(&policy_scope(&config.tenant))?;

            let Some(policy) = store.get_policy(&policy_name).await? else {
                return Ok(false);
            };
            let had_grant =
                PermissionGrant::from_policy(principal.clone(), &policy, &config.path_templates)
                    .is_some();

            let remaining = revoke_from_policy(policy, &config.path_templates);
            if remaining.is_empty() {
                store.delete_policy(&policy_name).await?;
            } else {
                store.set_policy(&remaining).await?;
            }
            tracing::info!(had_grant, "Revoked secret permissions");
            Ok(had_grant)
        }
        .instrument(span)
        .await
    }
}
