//! One-time, re-runnable setup of a tenant's presence in the secret store.
//!
//! There is no state field: each step treats "already configured" as
//! success, so a run interrupted at any point is completed by running again.
//! Nothing is rolled back.

use crate::config::ProvisioningSettings;
use crate::domain::{TenantId, TenantSecretsConfig};
use crate::errors::Result;
use crate::policy::is_glob_policy;
use crate::policy::naming::{CI_ROLE_TOKEN_POLICIES, CI_TOKEN_TYPE, CI_USER_CLAIM};
use crate::storage::TenantConfigRepository;
use crate::tenant_span;
use crate::vault::{is_path_in_use, AuthRole, JwtTrust, SecretStore, StoreFactory};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

const KV_ENGINE: &str = "kv";
const JWT_ENGINE: &str = "jwt";

/// Result of one provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step changed store or local state
    Applied,
    /// The desired state was already in place
    AlreadyConfigured,
    /// The step did not apply to this run
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningReport {
    pub tenant: String,
    pub secrets_engine: StepOutcome,
    pub auth_engine: StepOutcome,
    pub jwt_trust: StepOutcome,
    pub role: StepOutcome,
    pub activation: StepOutcome,
}

pub struct ProvisioningWorkflow {
    stores: Arc<dyn StoreFactory>,
    configs: Arc<dyn TenantConfigRepository>,
    settings: ProvisioningSettings,
}

impl ProvisioningWorkflow {
    pub fn new(
        stores: Arc<dyn StoreFactory>,
        configs: Arc<dyn TenantConfigRepository>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self { stores, configs, settings }
    }

    /// Create the tenant's configuration if needed, then run every step
    pub async fn provision(
        &self,
        tenant: TenantId,
        namespace_path: &str,
    ) -> Result<(TenantSecretsConfig, ProvisioningReport)> {
        let mut config =
            self.configs.create_if_absent(TenantSecretsConfig::new(tenant, namespace_path)).await?;
        let report = self.run(&mut config).await?;
        Ok((config, report))
    }

    /// Drive `config` to `active = true`
    pub async fn run(&self, config: &mut TenantSecretsConfig) -> Result<ProvisioningReport> {
        let span = tenant_span!("provision", config.tenant);
        async move {
            let store = self.stores.store_for(config)?;

            let secrets_engine = self.enable_secret_store(store.as_ref(), config).await?;
            let (auth_engine, jwt_trust) = self.enable_auth(store.as_ref(), config).await?;
            let role = self.configure_role(store.as_ref(), config).await?;
            let activation = self.activate(config).await?;

            let report = ProvisioningReport {
                tenant: config.tenant.to_string(),
                secrets_engine,
                auth_engine,
                jwt_trust,
                role,
                activation,
            };
            tracing::info!(?report, "Provisioning finished");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn enable_secret_store(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
    ) -> Result<StepOutcome> {
        match store.enable_secrets_engine(&config.mount, KV_ENGINE).await {
            Ok(()) => Ok(StepOutcome::Applied),
            // engine created by an earlier run whose activation never committed
            Err(e) if is_path_in_use(&e) => {
                tracing::debug!(mount = %config.mount, "Secrets engine already mounted");
                Ok(StepOutcome::AlreadyConfigured)
            }
            Err(e) => Err(e),
        }
    }

    /// Enable the JWT auth engine; trust is only configured on a fresh mount
    /// so manual changes to an existing one survive.
    async fn enable_auth(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
    ) -> Result<(StepOutcome, StepOutcome)> {
        let created = store.enable_auth_engine(&config.auth_mount, JWT_ENGINE, true).await?;
        if !created {
            return Ok((StepOutcome::AlreadyConfigured, StepOutcome::Skipped));
        }

        let trust = JwtTrust {
            issuer_url: self.settings.jwt_issuer_url.clone(),
            signing_key: self.settings.jwt_signing_key.clone(),
        };
        store.configure_jwt_trust(&config.auth_mount, &trust).await?;
        Ok((StepOutcome::Applied, StepOutcome::Applied))
    }

    async fn configure_role(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
    ) -> Result<StepOutcome> {
        let existing = store.get_role(&config.auth_mount, &config.auth_role).await?;
        let desired = self.desired_role(config, existing.as_ref());

        if existing.as_ref().is_some_and(|role| role.same_managed_fields(&desired)) {
            return Ok(StepOutcome::AlreadyConfigured);
        }
        store.update_role(&config.auth_mount, &config.auth_role, &desired).await?;
        Ok(StepOutcome::Applied)
    }

    /// CI role for the tenant, keeping glob policies unioned in by secrets
    /// and any fields this crate does not manage
    fn desired_role(&self, config: &TenantSecretsConfig, existing: Option<&AuthRole>) -> AuthRole {
        let mut token_policies: Vec<String> =
            CI_ROLE_TOKEN_POLICIES.iter().map(|p| p.to_string()).collect();
        if let Some(role) = existing {
            token_policies
                .extend(role.token_policies.iter().filter(|p| is_glob_policy(p)).cloned());
        }

        let mut bound_claims = BTreeMap::new();
        bound_claims.insert(
            config.tenant.kind.bound_claim().to_string(),
            Value::String(config.tenant.id.to_string()),
        );

        AuthRole {
            role_type: JWT_ENGINE.to_string(),
            token_policies,
            token_policies_template_claims: true,
            bound_claims,
            bound_audiences: vec![self.settings.public_url.clone()],
            user_claim: CI_USER_CLAIM.to_string(),
            token_type: CI_TOKEN_TYPE.to_string(),
            extra: existing.map(|role| role.extra.clone()).unwrap_or_default(),
        }
    }

    async fn activate(&self, config: &mut TenantSecretsConfig) -> Result<StepOutcome> {
        if config.active {
            return Ok(StepOutcome::AlreadyConfigured);
        }
        let changed = self.configs.mark_active(&config.tenant).await?;
        config.active = true;
        Ok(if changed { StepOutcome::Applied } else { StepOutcome::AlreadyConfigured })
    }
}
