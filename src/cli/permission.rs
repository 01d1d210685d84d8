//! Permission CLI commands

use super::output::{emit, OutputFormat};
use super::TenantArgs;
use crate::errors::Result as ServiceResult;
use crate::policy::{parse_permissions, PermissionGrant, Principal, PrincipalType};
use crate::services::SecretPermissionService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

#[derive(Args, Debug, Clone)]
pub struct PrincipalArgs {
    /// Principal kind: user, group, role or ci_identity
    #[arg(long)]
    principal_type: PrincipalType,

    #[arg(long)]
    principal_id: String,
}

impl PrincipalArgs {
    fn principal(&self) -> Principal {
        Principal::new(self.principal_type, self.principal_id.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum PermissionCommands {
    /// Replace a principal's permissions on the tenant's secrets
    Grant {
        #[command(flatten)]
        tenant: TenantArgs,

        #[command(flatten)]
        principal: PrincipalArgs,

        /// read, create, update or delete; repeat or comma-separate
        #[arg(long = "permission", value_delimiter = ',', required = true)]
        permissions: Vec<String>,

        /// RFC 3339 timestamp after which the grant lapses
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Show a principal's current permissions
    Show {
        #[command(flatten)]
        tenant: TenantArgs,

        #[command(flatten)]
        principal: PrincipalArgs,
    },

    /// Remove a principal's permissions
    Revoke {
        #[command(flatten)]
        tenant: TenantArgs,

        #[command(flatten)]
        principal: PrincipalArgs,
    },
}

fn build_grant(
    principal: Principal,
    permissions: &[String],
    expires_at: Option<DateTime<Utc>>,
) -> ServiceResult<PermissionGrant> {
    let grant = PermissionGrant::new(principal, parse_permissions(permissions)?);
    Ok(match expires_at {
        Some(at) => grant.expiring_at(at),
        None => grant,
    })
}

pub async fn handle_permission_command(
    command: PermissionCommands,
    service: &SecretPermissionService,
    format: OutputFormat,
) -> Result<bool> {
    match command {
        PermissionCommands::Grant { tenant, principal, permissions, expires_at } => {
            let result = match build_grant(principal.principal(), &permissions, expires_at) {
                Ok(grant) => service.update(&tenant.config(), grant).await,
                Err(e) => Err(e),
            };
            emit(result, format)
        }
        PermissionCommands::Show { tenant, principal } => {
            emit(service.get(&tenant.config(), &principal.principal()).await, format)
        }
        PermissionCommands::Revoke { tenant, principal } => {
            let principal = principal.principal();
            let result = service
                .revoke(&tenant.config(), &principal)
                .await
                .map(|revoked| serde_json::json!({ "policy": principal.policy_name(), "revoked": revoked }));
            emit(result, format)
        }
    }
}
