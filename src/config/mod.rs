//! # Configuration Management
//!
//! Settings for the secrets lifecycle engine, loaded from environment variables
//! and validated with the `validator` crate.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct Settings {
    /// Secret store connection
    #[validate(nested)]
    pub vault: VaultSettings,

    /// Tenant provisioning parameters
    #[validate(nested)]
    pub provisioning: ProvisioningSettings,

    /// Rotation reminder reconciler parameters
    #[validate(nested)]
    pub reconciler: ReconcilerSettings,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Load every section from the environment
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            vault: VaultSettings::from_env()?,
            provisioning: ProvisioningSettings::from_env(),
            reconciler: ReconcilerSettings::from_env()?,
            observability: ObservabilityConfig::from_env(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)
    }
}

/// Connection settings for the external secret store
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct VaultSettings {
    /// Store base URL (e.g., "https://vault.example.com:8200")
    #[validate(url(message = "Vault address must be a valid URL"))]
    pub address: String,

    /// Bearer JWT presented on every request
    #[serde(default)]
    pub jwt: Option<String>,

    /// Root namespace all tenant namespaces are nested under
    #[serde(default)]
    pub namespace: Option<String>,

    /// Transport timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Page size used when listing secrets
    #[validate(range(min = 1, max = 1000, message = "List page size must be between 1 and 1000"))]
    pub list_page_size: usize,
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("list_page_size", &self.list_page_size)
            .finish()
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            jwt: None,
            namespace: None,
            timeout_seconds: 30,
            list_page_size: 100,
        }
    }
}

impl VaultSettings {
    /// Load store settings from the environment.
    ///
    /// Uses:
    /// - `VAULTGATE_VAULT_ADDR` or `VAULT_ADDR`
    /// - `VAULTGATE_VAULT_JWT`
    /// - `VAULTGATE_VAULT_NAMESPACE` or `VAULT_NAMESPACE`
    /// - `VAULTGATE_VAULT_TIMEOUT_SECS` (default: 30)
    /// - `VAULTGATE_LIST_PAGE_SIZE` (default: 100)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let address = std::env::var("VAULTGATE_VAULT_ADDR")
            .or_else(|_| std::env::var("VAULT_ADDR"))
            .unwrap_or(defaults.address);

        let jwt = std::env::var("VAULTGATE_VAULT_JWT").ok();

        let namespace = std::env::var("VAULTGATE_VAULT_NAMESPACE")
            .or_else(|_| std::env::var("VAULT_NAMESPACE"))
            .ok()
            .filter(|ns| !ns.is_empty());

        let timeout_seconds =
            parse_env("VAULTGATE_VAULT_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_seconds);
        let list_page_size =
            parse_env("VAULTGATE_LIST_PAGE_SIZE")?.unwrap_or(defaults.list_page_size);

        Ok(Self { address, jwt, namespace, timeout_seconds, list_page_size })
    }

    /// Get the transport timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Parameters used when provisioning a tenant's store presence
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProvisioningSettings {
    /// Public URL of the platform; CI tokens must carry it as audience
    #[validate(url(message = "Public URL must be a valid URL"))]
    pub public_url: String,

    /// Issuer discovery URL configured on the JWT auth engine
    #[validate(url(message = "JWT issuer URL must be a valid URL"))]
    pub jwt_issuer_url: String,

    /// PEM public key used to validate CI tokens
    #[serde(default)]
    pub jwt_signing_key: Option<String>,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_string(),
            jwt_issuer_url: "http://localhost:8080".to_string(),
            jwt_signing_key: None,
        }
    }
}

impl ProvisioningSettings {
    /// Load provisioning settings from the environment.
    ///
    /// `VAULTGATE_JWT_ISSUER_URL` defaults to `VAULTGATE_PUBLIC_URL`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let public_url = std::env::var("VAULTGATE_PUBLIC_URL").unwrap_or(defaults.public_url);
        let jwt_issuer_url =
            std::env::var("VAULTGATE_JWT_ISSUER_URL").unwrap_or_else(|_| public_url.clone());
        let jwt_signing_key = std::env::var("VAULTGATE_JWT_SIGNING_KEY").ok();

        Self { public_url, jwt_issuer_url, jwt_signing_key }
    }
}

/// Rotation reminder batch parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReconcilerSettings {
    /// Maximum reminders examined per invocation
    #[validate(range(min = 1, max = 1000, message = "Batch size must be between 1 and 1000"))]
    pub batch_size: usize,

    /// Minutes a reminder that failed to process waits before it is due again
    #[validate(range(min = 1, max = 10080, message = "Retry backoff must be between 1 and 10080 minutes"))]
    pub retry_backoff_minutes: u32,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self { batch_size: 100, retry_backoff_minutes: 60 }
    }
}

impl ReconcilerSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let batch_size =
            parse_env("VAULTGATE_REMINDER_BATCH_SIZE")?.unwrap_or(defaults.batch_size);
        let retry_backoff_minutes = parse_env("VAULTGATE_REMINDER_RETRY_MINUTES")?
            .unwrap_or(defaults.retry_backoff_minutes);
        Ok(Self { batch_size, retry_backoff_minutes })
    }

    pub fn retry_backoff(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.retry_backoff_minutes))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let log_level = std::env::var("VAULTGATE_LOG_LEVEL").unwrap_or(defaults.log_level);
        let json_logging = std::env::var("VAULTGATE_LOG_JSON")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.json_logging);

        Self { log_level, json_logging }
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
