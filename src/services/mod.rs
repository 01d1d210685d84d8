//! Business logic services
//!
//! This module contains the secrets lifecycle workflows. Services take their
//! collaborators (store factory, lease provider, repositories) as trait
//! objects and hold no other state.

pub mod ci_policy;
pub mod lifecycle;
pub mod permissions;
pub mod provisioning;
pub mod reconciler;

pub use ci_policy::CiPolicyManager;
pub use lifecycle::{CreateSecretRequest, SecretLifecycleService, SecretStream, UpdateSecretRequest};
pub use permissions::SecretPermissionService;
pub use provisioning::{ProvisioningReport, ProvisioningWorkflow, StepOutcome};
pub use reconciler::{
    Classification, LoggingNotifier, OrphanReason, ReconcileReport, ReminderNotifier,
    RotationReminderReconciler,
};
