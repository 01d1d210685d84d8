//! Secret CLI commands
//!
//! Thin wrappers over [`SecretLifecycleService`]. Values are read from a flag
//! or a file and never echoed back.

use super::output::{emit, OutputFormat};
use super::TenantArgs;
use crate::domain::SecretValue;
use crate::services::{CreateSecretRequest, SecretLifecycleService, UpdateSecretRequest};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use futures::{StreamExt, TryStreamExt};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Store a new secret and grant CI reads on its scope
    Create {
        #[command(flatten)]
        tenant: TenantArgs,

        /// Secret name (letters, digits, '_' and '-')
        #[arg(long)]
        name: String,

        #[command(flatten)]
        value: ValueArgs,

        /// Environment scope, '*' globs allowed
        #[arg(long)]
        environment: String,

        /// Branch scope, '*' globs allowed
        #[arg(long)]
        branch: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Show a secret's metadata
    Get {
        #[command(flatten)]
        tenant: TenantArgs,

        #[arg(long)]
        name: String,
    },

    /// List the tenant's secrets
    List {
        #[command(flatten)]
        tenant: TenantArgs,

        /// Resume after this secret name
        #[arg(long)]
        start_after: Option<String>,

        /// Stop after this many secrets
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Change a secret's value or metadata
    Update {
        #[command(flatten)]
        tenant: TenantArgs,

        #[arg(long)]
        name: String,

        #[command(flatten)]
        value: OptionalValueArgs,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        branch: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a secret and withdraw its CI reads
    Delete {
        #[command(flatten)]
        tenant: TenantArgs,

        #[arg(long)]
        name: String,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ValueArgs {
    /// Secret value (visible in shell history; prefer --value-file)
    #[arg(long)]
    value: Option<String>,

    /// Read the secret value from a file
    #[arg(long)]
    value_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
pub struct OptionalValueArgs {
    /// New secret value
    #[arg(long)]
    value: Option<String>,

    /// Read the new secret value from a file
    #[arg(long)]
    value_file: Option<PathBuf>,
}

async fn read_value(value: Option<String>, file: Option<PathBuf>) -> Result<Option<SecretValue>> {
    if let Some(value) = value {
        return Ok(Some(SecretValue::new(value)));
    }
    match file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read secret value from {}", path.display()))?;
            Ok(Some(SecretValue::new(raw.trim_end_matches(['\r', '\n']))))
        }
        None => Ok(None),
    }
}

pub async fn handle_secret_command(
    command: SecretCommands,
    service: &SecretLifecycleService,
    format: OutputFormat,
) -> Result<bool> {
    match command {
        SecretCommands::Create { tenant, name, value, environment, branch, description } => {
            let config = tenant.config();
            let value = read_value(value.value, value.value_file)
                .await?
                .context("A secret value is required")?;
            let request = CreateSecretRequest { name, value, environment, branch, description };
            emit(service.create(&config, request).await, format)
        }
        SecretCommands::Get { tenant, name } => {
            emit(service.read(&tenant.config(), &name).await, format)
        }
        SecretCommands::List { tenant, start_after, limit } => {
            let result = match service.list(&tenant.config(), start_after) {
                Ok(stream) => match limit {
                    Some(limit) => stream.take(limit).try_collect::<Vec<_>>().await,
                    None => stream.try_collect::<Vec<_>>().await,
                },
                Err(e) => Err(e),
            };
            emit(result, format)
        }
        SecretCommands::Update { tenant, name, value, environment, branch, description } => {
            let request = UpdateSecretRequest {
                value: read_value(value.value, value.value_file).await?,
                description,
                environment,
                branch,
            };
            if request.is_empty() {
                anyhow::bail!("Nothing to update: pass --value, --environment, --branch or --description");
            }
            emit(service.update(&tenant.config(), &name, request).await, format)
        }
        SecretCommands::Delete { tenant, name } => {
            emit(service.delete(&tenant.config(), &name).await, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_value_prefers_flag() {
        let value = read_value(Some("inline".to_string()), None).await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "inline");
        assert!(read_value(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_value_from_file_strips_newline() {
        let path = std::env::temp_dir().join(format!("vaultgate-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "s3cr3t\n").await.unwrap();
        let value = read_value(None, Some(path.clone())).await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "s3cr3t");
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(read_value(None, Some(path)).await.is_err());
    }
}
