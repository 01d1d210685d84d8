//! # Policy Engine
//!
//! Capability-based ACL synthesis. Everything in this module is pure: it
//! computes policies and policy names, persisting them is the services'
//! job.

pub mod acl;
pub mod capability;
pub mod grant;
pub mod naming;

pub use acl::{AclPolicy, PathRule};
pub use capability::{parse_permissions, Capability, CapabilitySet, Permission};
pub use grant::{
    grant_to_policy, revoke_from_policy, PermissionGrant, Principal, PrincipalType,
};
pub use naming::{ci_policy_name, glob_auth_policies, is_glob_policy, principal_policy_name};
