//! # Vaultgate
//!
//! Vaultgate is a multi-tenant secrets lifecycle and access-control engine that
//! sits in front of a KV-v2 secret store. It owns no secret data itself: values
//! and metadata live in the store, and Vaultgate decides which paths exist,
//! which policies grant access to them, and when owners must rotate them.
//!
//! ## Architecture
//!
//! ```text
//! CLI / embedding process → Services → PolicyEngine (pure)
//!                              ↓              ↓
//!                      Local records    SecretStore (VaultClient, namespace-scoped)
//! ```
//!
//! ## Core Components
//!
//! - **VaultClient**: reqwest client over the store's HTTP API, re-scoped per tenant namespace
//! - **PolicyEngine**: Capability sets, ACL synthesis from permission grants, CI policy naming
//! - **SecretLifecycleService**: Secret create/read/list/update/delete with CI read policy upkeep
//! - **ProvisioningWorkflow**: Idempotent, fail-closed setup of a tenant's store presence
//! - **RotationReminderReconciler**: Bounded batch job discarding reminders for vanished secrets
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultgate::config::Settings;
//! use vaultgate::domain::{TenantId, TenantSecretsConfig};
//! use vaultgate::lease::InMemoryLeaseProvider;
//! use vaultgate::services::{CreateSecretRequest, SecretLifecycleService};
//! use vaultgate::vault::{VaultClient, VaultClientFactory};
//!
//! # async fn example() -> vaultgate::Result<()> {
//! let settings = Settings::from_env()?;
//! let stores = Arc::new(VaultClientFactory::new(VaultClient::from_settings(&settings.vault)?));
//! let service = SecretLifecycleService::new(stores, Arc::new(InMemoryLeaseProvider::new()), 100);
//!
//! let mut config = TenantSecretsConfig::new(TenantId::project(42), "group_7");
//! config.active = true;
//! let request = CreateSecretRequest {
//!     name: "DATABASE_URL".to_string(),
//!     value: "postgres://...".into(),
//!     environment: "production".to_string(),
//!     branch: "main".to_string(),
//!     description: None,
//! };
//! service.create(&config, request).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lease;
pub mod observability;
pub mod policy;
pub mod services;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod test_support;

// Re-export commonly used types and traits
pub use config::Settings;
pub use errors::{Error, ErrorKind, Result, ServiceResponse};
pub use observability::init_logging;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
