//! # Command Line Interface
//!
//! Operator commands for provisioning tenants, managing secrets and
//! permissions, and computing CI policy names.
//!
//! The CLI keeps no local records: tenants are addressed by id and namespace
//! on every invocation, and commands other than `provision` assume the
//! tenant was provisioned already.
//!
//! Policy leases are in-process. Two CLI invocations never exclude each
//! other; embedders that need cross-process exclusion pass their own
//! [`LeaseProvider`] to [`run_cli_with`].

pub mod output;
pub mod permission;
pub mod secret;

use crate::config::Settings;
use crate::domain::{TenantId, TenantSecretsConfig};
use crate::lease::{InMemoryLeaseProvider, LeaseProvider};
use crate::policy::{ci_policy_name, is_glob_policy};
use crate::services::{ProvisioningWorkflow, SecretLifecycleService, SecretPermissionService};
use crate::storage::InMemoryTenantConfigRepository;
use crate::vault::{StoreFactory, VaultClient, VaultClientFactory};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use output::{emit, OutputFormat};
use permission::PermissionCommands;
use secret::SecretCommands;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "vaultgate")]
#[command(about = "Secrets lifecycle and policy tooling for a KV-v2 secret store")]
#[command(long_about = "Secrets lifecycle and policy tooling for a KV-v2 secret store.\n\n\
Policy updates are serialized per tenant with in-process leases only: concurrent \
invocations of this binary do not exclude each other, so run policy-changing \
commands for one tenant from a single operator at a time.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision (or finish provisioning) a tenant's store presence
    Provision {
        #[command(flatten)]
        tenant: TenantArgs,
    },

    /// Secret management commands
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },

    /// Permission management commands
    Permission {
        #[command(subcommand)]
        command: PermissionCommands,
    },

    /// Print the CI policy name for a secret scope
    PolicyName {
        #[arg(long, default_value = crate::domain::DEFAULT_SECRETS_MOUNT)]
        mount: String,

        #[arg(long)]
        environment: String,

        #[arg(long)]
        branch: String,
    },
}

/// Identifies the tenant a command acts on
#[derive(Args, Debug, Clone)]
pub struct TenantArgs {
    /// Project owning the secrets
    #[arg(long, required_unless_present = "group", conflicts_with = "group")]
    pub project: Option<i64>,

    /// Group owning the secrets
    #[arg(long)]
    pub group: Option<i64>,

    /// Namespace path of the tenant's top-level group
    #[arg(long)]
    pub namespace: String,
}

impl TenantArgs {
    pub fn tenant(&self) -> TenantId {
        match (self.project, self.group) {
            (Some(id), _) => TenantId::project(id),
            (None, Some(id)) => TenantId::group(id),
            // clap enforces one of the two
            (None, None) => TenantId::project(0),
        }
    }

    /// Configuration of an already provisioned tenant
    pub fn config(&self) -> TenantSecretsConfig {
        let mut config = TenantSecretsConfig::new(self.tenant(), self.namespace.as_str());
        config.active = true;
        config
    }
}

fn store_factory(settings: &Settings) -> Result<Arc<dyn StoreFactory>> {
    let root = VaultClient::from_settings(&settings.vault)
        .context("Failed to configure the secret store client")?;
    Ok(Arc::new(VaultClientFactory::new(root)))
}

/// Run a parsed command line; returns whether the command succeeded
pub async fn run_cli(cli: Cli, settings: Settings) -> Result<bool> {
    run_cli_with(cli, settings, Arc::new(InMemoryLeaseProvider::new())).await
}

/// Run a parsed command line with policy leases taken from `leases`
pub async fn run_cli_with(
    cli: Cli,
    settings: Settings,
    leases: Arc<dyn LeaseProvider>,
) -> Result<bool> {
    let format = cli.output;

    match cli.command {
        Commands::PolicyName { mount, environment, branch } => {
            let name = ci_policy_name(&mount, &environment, &branch);
            let payload = serde_json::json!({ "policy": name, "glob": is_glob_policy(&name) });
            emit(Ok(payload), format)
        }
        Commands::Provision { tenant } => {
            let workflow = ProvisioningWorkflow::new(
                store_factory(&settings)?,
                Arc::new(InMemoryTenantConfigRepository::new()),
                settings.provisioning.clone(),
            );
            let result = workflow
                .provision(tenant.tenant(), &tenant.namespace)
                .await
                .map(|(_, report)| report);
            emit(result, format)
        }
        Commands::Secret { command } => {
            let service = SecretLifecycleService::new(
                store_factory(&settings)?,
                leases,
                settings.vault.list_page_size,
            );
            secret::handle_secret_command(command, &service, format).await
        }
        Commands::Permission { command } => {
            let service = SecretPermissionService::new(store_factory(&settings)?, leases);
            permission::handle_permission_command(command, &service, format).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TenantKind;
    use crate::lease::policy_scope;

    #[test]
    fn test_parse_secret_create() {
        let cli = Cli::try_parse_from([
            "vaultgate",
            "secret",
            "create",
            "--project",
            "42",
            "--namespace",
            "group_7",
            "--name",
            "db",
            "--value",
            "s3cr3t",
            "--environment",
            "production",
            "--branch",
            "main",
            "-o",
            "yaml",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Yaml);
        match cli.command {
            Commands::Secret { command: SecretCommands::Create { tenant, name, .. } } => {
                assert_eq!(tenant.tenant(), TenantId::project(42));
                assert!(tenant.config().active);
                assert_eq!(name, "db");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_tenant_requires_exactly_one_owner() {
        let neither = Cli::try_parse_from(["vaultgate", "provision", "--namespace", "g"]);
        assert!(neither.is_err());

        let both = Cli::try_parse_from([
            "vaultgate", "provision", "--project", "1", "--group", "2", "--namespace", "g",
        ]);
        assert!(both.is_err());

        let group = Cli::try_parse_from(["vaultgate", "provision", "--group", "2", "--namespace", "g"])
            .unwrap();
        let Commands::Provision { tenant } = group.command else {
            panic!("expected provision");
        };
        assert_eq!(tenant.tenant().kind, TenantKind::Group);
        assert!(tenant.config().tenant_path.is_empty());
    }

    #[test]
    fn test_create_requires_value_source() {
        let missing = Cli::try_parse_from([
            "vaultgate", "secret", "create", "--project", "1", "--namespace", "g", "--name", "db",
            "--environment", "production", "--branch", "main",
        ]);
        assert!(missing.is_err());
    }

    #[test]
    fn test_parse_permission_grant() {
        let cli = Cli::try_parse_from([
            "vaultgate",
            "permission",
            "grant",
            "--group",
            "7",
            "--namespace",
            "group_7",
            "--principal-type",
            "role",
            "--principal-id",
            "maintainer",
            "--permission",
            "read,update",
            "--expires-at",
            "2030-01-01T00:00:00Z",
        ])
        .unwrap();
        let Commands::Permission { command: PermissionCommands::Grant { permissions, expires_at, .. } } =
            cli.command
        else {
            panic!("expected permission grant");
        };
        assert_eq!(permissions, ["read", "update"]);
        assert!(expires_at.is_some());
    }

    #[tokio::test]
    async fn test_policy_name_needs_no_store() {
        let cli = Cli::try_parse_from([
            "vaultgate", "policy-name", "--environment", "review/*", "--branch", "main",
        ])
        .unwrap();
        assert!(run_cli(cli, Settings::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_commands_require_credential() {
        let cli = Cli::try_parse_from([
            "vaultgate", "secret", "get", "--project", "1", "--namespace", "g", "--name", "db",
        ])
        .unwrap();
        assert!(run_cli(cli, Settings::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_shared_leases_exclude_store_commands() {
        let mut settings = Settings::default();
        settings.vault.jwt = Some("operator-jwt".to_string());
        let leases = Arc::new(InMemoryLeaseProvider::new());
        let _held = leases.try_acquire(&policy_scope(&TenantId::group(7))).unwrap();

        let grant = Cli::try_parse_from([
            "vaultgate", "permission", "grant", "--group", "7", "--namespace", "group_7",
            "--principal-type", "role", "--principal-id", "maintainer", "--permission", "read",
        ])
        .unwrap();
        assert!(!run_cli_with(grant, settings.clone(), leases.clone()).await.unwrap());

        let create = Cli::try_parse_from([
            "vaultgate", "secret", "create", "--group", "7", "--namespace", "group_7", "--name",
            "db", "--value", "s3cr3t", "--environment", "production", "--branch", "main",
        ])
        .unwrap();
        assert!(!run_cli_with(create, settings, leases.clone()).await.unwrap());
        assert!(leases.is_held(&policy_scope(&TenantId::group(7))));
    }

    #[test]
    fn test_help_describes_lease_scope() {
        use clap::CommandFactory;
        let command = Cli::command();
        let about = command.get_long_about().map(ToString::to_string).unwrap_or_default();
        assert!(about.contains("in-process leases"));
        assert!(about.contains("do not exclude each other"));
    }
}
