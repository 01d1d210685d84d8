//! Create, read, update, delete and list a tenant's secrets.
//!
//! Writes fail closed: the value is stored before any CI policy references
//! it, so a partial failure leaves a secret only tenant administrators can
//! reach, never an over-exposed one.

use super::ci_policy::CiPolicyManager;
use crate::domain::secret::validate_secret_name;
use crate::domain::{Secret, SecretValue, TenantSecretsConfig, MAX_SECRET_SIZE};
use crate::errors::{Error, Result};
use crate::lease::LeaseProvider;
use crate::tenant_span;
use crate::vault::{is_cas_mismatch, list_secrets, SecretMetadataRecord, SecretStore, StoreFactory};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use validator::Validate;

pub type SecretStream = BoxStream<'static, Result<Secret>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretRequest {
    pub name: String,
    pub value: SecretValue,
    pub environment: String,
    pub branch: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields to change; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSecretRequest {
    #[serde(default)]
    pub value: Option<SecretValue>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl UpdateSecretRequest {
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.description.is_none()
            && self.environment.is_none()
            && self.branch.is_none()
    }
}

pub struct SecretLifecycleService {
    stores: Arc<dyn StoreFactory>,
    ci_policies: CiPolicyManager,
    page_size: usize,
}

impl SecretLifecycleService {
    pub fn new(
        stores: Arc<dyn StoreFactory>,
        leases: Arc<dyn LeaseProvider>,
        page_size: usize,
    ) -> Self {
        Self { stores, ci_policies: CiPolicyManager::new(leases), page_size }
    }

    /// Store a new secret and grant CI reads on its scope.
    ///
    /// Fails with a `name` validation error when the secret already exists.
    pub async fn create(
        &self,
        config: &TenantSecretsConfig,
        request: CreateSecretRequest,
    ) -> Result<Secret> {
        let mut secret =
            Secret::new(request.name, request.value, request.environment, request.branch);
        secret.description = request.description;
        secret.validate_for_write()?;
        config.ensure_active()?;

        let span = tenant_span!("create_secret", config.tenant, secret = %secret.name);
        async move {
            let lease = self.ci_policies.lease(config)?;
            let store = self.stores.store_for(config)?;
            let path = config.secret_path(&secret.name);
            let value = secret.value.take().ok_or_else(|| Error::internal("Secret value missing"))?;

            let version = match store
                .update_secret(&config.mount, &path, &value, &secret.custom_metadata(), Some(0))
                .await
            {
                Ok(version) => version,
                Err(e) if is_cas_mismatch(&e) => {
                    return Err(Error::validation_field(
                        format!("Secret '{}' already exists", secret.name),
                        "name",
                    ));
                }
                Err(e) => return Err(e),
            };
            secret.version = Some(version);

            if let Err(e) = self.ci_policies.attach(&lease, store.as_ref(), config, &secret).await {
                tracing::warn!(error = %e, "Secret stored but CI read policy could not be attached");
                return Err(e);
            }

            tracing::info!(version, "Created secret");
            Ok(secret)
        }
        .instrument(span)
        .await
    }

    /// Current metadata of one secret; the value is never included
    pub async fn read(&self, config: &TenantSecretsConfig, name: &str) -> Result<Secret> {
        config.ensure_active()?;
        check_name(name)?;
        let store = self.stores.store_for(config)?;
        let (secret, _) = self.fetch(store.as_ref(), config, name).await?;
        Ok(secret)
    }

    /// Lazily stream every secret, optionally resuming after `start_after`.
    ///
    /// Entries without the scope metadata this crate writes are skipped.
    pub fn list(
        &self,
        config: &TenantSecretsConfig,
        start_after: Option<String>,
    ) -> Result<SecretStream> {
        config.ensure_active()?;
        let store = self.stores.store_for(config)?;
        let entries =
            list_secrets(store, &config.mount, config.secrets_prefix(), start_after, self.page_size);

        Ok(entries
            .try_filter_map(|entry| async move {
                match materialize(&entry.key, &entry.metadata) {
                    Ok(secret) => Ok(Some(secret)),
                    Err(e) => {
                        tracing::debug!(key = %entry.key, error = %e, "Skipping foreign secret entry");
                        Ok(None)
                    }
                }
            })
            .boxed())
    }

    /// Read-modify-write of a secret.
    ///
    /// A new value is written with check-and-set against the version read;
    /// metadata-only changes have no such protection and the last writer wins.
    pub async fn update(
        &self,
        config: &TenantSecretsConfig,
        name: &str,
        request: UpdateSecretRequest,
    ) -> Result<Secret> {
        if let Some(value) = &request.value {
            check_value(value)?;
        }
        config.ensure_active()?;
        check_name(name)?;

        let span = tenant_span!("update_secret", config.tenant, secret = %name);
        async move {
            let lease = self.ci_policies.lease(config)?;
            let store = self.stores.store_for(config)?;
            let (current, record) = self.fetch(store.as_ref(), config, name).await?;

            let mut updated = current.clone();
            if let Some(environment) = request.environment {
                updated.environment = environment;
            }
            if let Some(branch) = request.branch {
                updated.branch = branch;
            }
            if request.description.is_some() {
                updated.description = request.description;
            }
            updated.validate()?;

            let path = config.secret_path(name);
            match &request.value {
                Some(value) => {
                    let version = store
                        .update_secret(
                            &config.mount,
                            &path,
                            value,
                            &updated.custom_metadata(),
                            Some(record.current_version),
                        )
                        .await
                        .map_err(|e| {
                            if is_cas_mismatch(&e) {
                                Error::conflict(format!("Secret '{}' was modified concurrently", name))
                            } else {
                                e
                            }
                        })?;
                    updated.version = Some(version);
                }
                None => {
                    store.update_secret_metadata(&config.mount, &path, &updated.custom_metadata()).await?;
                }
            }

            self.ci_policies.refresh(&lease, store.as_ref(), config, &current, &updated).await?;
            tracing::info!("Updated secret");
            Ok(updated)
        }
        .instrument(span)
        .await
    }

    /// Delete a secret and withdraw its CI read grant.
    ///
    /// A secret whose scope metadata is unreadable is still removed from the
    /// store; no CI grant can reference it, so nothing is retracted.
    pub async fn delete(&self, config: &TenantSecretsConfig, name: &str) -> Result<Secret> {
        config.ensure_active()?;
        check_name(name)?;

        let span = tenant_span!("delete_secret", config.tenant, secret = %name);
        async move {
            let lease = self.ci_policies.lease(config)?;
            let store = self.stores.store_for(config)?;
            let path = config.secret_path(name);
            let record = store
                .read_secret_metadata(&config.mount, &path)
                .await?
                .ok_or_else(|| Error::not_found("secret", name))?;

            match materialize(name, &record) {
                Ok(secret) => {
                    store.delete_secret(&config.mount, &path).await?;
                    self.ci_policies.retract(&lease, store.as_ref(), config, &secret).await?;
                    tracing::info!("Deleted secret");
                    Ok(secret)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Deleting secret without scope metadata; no CI grant to retract");
                    store.delete_secret(&config.mount, &path).await?;
                    Ok(Secret {
                        name: name.to_string(),
                        environment: String::new(),
                        branch: String::new(),
                        description: None,
                        rotation_info_id: None,
                        version: Some(record.current_version),
                        created_at: record.created_at,
                        value: None,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch(
        &self,
        store: &dyn SecretStore,
        config: &TenantSecretsConfig,
        name: &str,
    ) -> Result<(Secret, SecretMetadataRecord)> {
        let record = store
            .read_secret_metadata(&config.mount, &config.secret_path(name))
            .await?
            .ok_or_else(|| Error::not_found("secret", name))?;
        let secret = materialize(name, &record)?;
        Ok((secret, record))
    }
}

fn materialize(name: &str, record: &SecretMetadataRecord) -> Result<Secret> {
    let mut secret = Secret::from_metadata(name, &record.custom_metadata)?;
    secret.version = Some(record.current_version);
    secret.created_at = record.created_at;
    Ok(secret)
}

fn check_name(name: &str) -> Result<()> {
    validate_secret_name(name).map_err(|_| {
        Error::validation_field(format!("Invalid secret name: '{}'", name), "name")
    })
}

fn check_value(value: &SecretValue) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation_field("Secret value cannot be empty", "value"));
    }
    if value.exceeds_quota() {
        return Err(Error::validation_field(
            format!("Secret value exceeds the maximum size of {} bytes", MAX_SECRET_SIZE),
            "value",
        ));
    }
    Ok(())
}
