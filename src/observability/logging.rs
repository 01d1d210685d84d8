//! # Structured Logging
//!
//! Logging setup and span helpers built on the tracing ecosystem.
//!
//! Secret values never appear in log fields; [`crate::domain::SecretValue`]
//! redacts itself in every formatting path.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Create a debug span for a secret store call.
///
/// ```rust,ignore
/// let span = store_span!("update_secret", mount = "secrets/kv", path = "explicit/db");
/// ```
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create an info span for a tenant-scoped service operation.
#[macro_export]
macro_rules! tenant_span {
    ($operation:expr, $tenant:expr) => {
        tracing::info_span!(
            "secrets_operation",
            operation = %$operation,
            tenant = %$tenant
        )
    };
    ($operation:expr, $tenant:expr, $($field:tt)*) => {
        tracing::info_span!(
            "secrets_operation",
            operation = %$operation,
            tenant = %$tenant,
            $($field)*
        )
    };
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// is tolerated (the second subscriber is ignored), which keeps integration
/// tests and embedding processes from tripping over each other.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.log_level),
    }
    .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let installed = if config.json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(true).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed; keeping existing one");
    }

    tracing::debug!(
        log_level = %config.log_level,
        json_logging = config.json_logging,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = store_span!("get_policy");
        let _span = store_span!("update_secret", mount = "secrets/kv", path = "explicit/db");
        let _span = tenant_span!("create_secret", "project_1");
        let _span = tenant_span!("create_secret", "project_1", secret = "db");
    }

    #[test]
    fn test_init_logging_twice_is_ok() {
        let config = ObservabilityConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = ObservabilityConfig { log_level: "info,vaultgate=loudest".to_string(), json_logging: false };
        assert!(matches!(init_logging(&config), Err(Error::Config(_))));
    }
}
