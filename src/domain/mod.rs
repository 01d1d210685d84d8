//! Domain layer
//!
//! Pure domain entities for the secrets lifecycle engine. Nothing here talks
//! to the secret store or to local persistence.
//!
//! ## Module Organization
//!
//! - `tenant`: Tenant identity, path templates and the tenant's store configuration
//! - `secret`: Logical secrets and their custom metadata encoding
//! - `value`: Redacting, zeroizing wrapper for secret values
//! - `reminder`: Rotation reminder records

pub mod reminder;
pub mod secret;
pub mod tenant;
pub mod value;

pub use reminder::RotationReminder;
pub use secret::{is_glob, CustomMetadata, Secret, GLOB_MARKER};
pub use tenant::{
    PathTemplates, TenantId, TenantKind, TenantSecretsConfig, DEFAULT_AUTH_MOUNT,
    DEFAULT_AUTH_ROLE, DEFAULT_SECRETS_MOUNT,
};
pub use value::{SecretValue, MAX_SECRET_SIZE};
