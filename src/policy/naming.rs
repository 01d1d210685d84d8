//! Deterministic policy names.
//!
//! Names are pure functions of their inputs so concurrent or repeated grants
//! targeting the same scope converge on the same policy.

use super::grant::{Principal, PrincipalType};
use crate::domain::is_glob;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const CI_COMBINED_PREFIX: &str = "pipelines/combined";
const CI_GLOB_PREFIX: &str = "pipelines/glob/";

/// Hex digits of the glob scope hash kept in the policy name
const GLOB_DIGEST_LEN: usize = 32;

/// Token policies every CI token receives, templated from its claims.
///
/// The first resolves to the concrete environment/branch policy of the
/// running pipeline; the second to the pipeline's own identity policy.
pub const CI_ROLE_TOKEN_POLICIES: [&str; 2] = [
    "pipelines/combined/env/{{ .environment | hex }}/branch/{{ .ref | hex }}",
    "pipelines/identity/{{ .user_id }}",
];

/// Claim identifying the user a CI token acts for
pub const CI_USER_CLAIM: &str = "user_id";

/// Token type issued to CI logins
pub const CI_TOKEN_TYPE: &str = "batch";

/// Name of the policy granting CI reads for an environment/branch scope.
///
/// Concrete scopes map onto the name the role templates resolve for a
/// matching pipeline. Glob scopes get a stable digest-based name that must be
/// unioned into the role's token policies.
pub fn ci_policy_name(mount: &str, environment: &str, branch: &str) -> String {
    if is_glob(environment) || is_glob(branch) {
        let mut hasher = Sha256::new();
        for part in [mount, environment, branch] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());
        format!("{}{}", CI_GLOB_PREFIX, &digest[..GLOB_DIGEST_LEN])
    } else {
        format!(
            "{}/env/{}/branch/{}",
            CI_COMBINED_PREFIX,
            hex::encode(environment),
            hex::encode(branch)
        )
    }
}

/// Policy names the CI auth role must carry for a glob-scoped secret.
///
/// Empty when neither environment nor branch contains a glob marker.
pub fn glob_auth_policies(mount: &str, environment: &str, branch: &str) -> BTreeSet<String> {
    let mut policies = BTreeSet::new();
    if is_glob(environment) || is_glob(branch) {
        policies.insert(ci_policy_name(mount, environment, branch));
    }
    policies
}

pub fn is_glob_policy(name: &str) -> bool {
    name.starts_with(CI_GLOB_PREFIX)
}

pub fn principal_policy_name(principal: &Principal) -> String {
    match principal.kind {
        PrincipalType::User => format!("users/direct/user_{}", principal.id),
        PrincipalType::Group => format!("users/direct/group_{}", principal.id),
        PrincipalType::Role => format!("users/roles/{}", principal.id),
        PrincipalType::CiIdentity => format!("pipelines/identity/{}", principal.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_ci_policy_name() {
        let name = ci_policy_name("secrets/kv", "production", "main");
        assert_eq!(
            name,
            format!("pipelines/combined/env/{}/branch/{}", hex::encode("production"), "6d61696e")
        );
        assert!(!is_glob_policy(&name));
        assert!(glob_auth_policies("secrets/kv", "production", "main").is_empty());
    }

    #[test]
    fn test_glob_policies_converge() {
        let first = glob_auth_policies("secrets/kv", "review/*", "main");
        let second = glob_auth_policies("secrets/kv", "review/*", "main");
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);

        let union: BTreeSet<_> = first.union(&second).cloned().collect();
        assert_eq!(union, first);

        let name = first.iter().next().unwrap();
        assert!(is_glob_policy(name));
        assert_eq!(name.len(), CI_GLOB_PREFIX.len() + GLOB_DIGEST_LEN);
    }

    #[test]
    fn test_glob_names_depend_on_every_part() {
        let base = ci_policy_name("secrets/kv", "*", "main");
        assert_ne!(base, ci_policy_name("other/kv", "*", "main"));
        assert_ne!(base, ci_policy_name("secrets/kv", "*", "develop"));
        // separators keep shifted boundaries distinct
        assert_ne!(ci_policy_name("a", "b*", "c"), ci_policy_name("ab", "*", "c"));
    }

    #[test]
    fn test_principal_policy_names() {
        let cases = [
            (PrincipalType::User, "users/direct/user_5"),
            (PrincipalType::Group, "users/direct/group_5"),
            (PrincipalType::Role, "users/roles/5"),
            (PrincipalType::CiIdentity, "pipelines/identity/5"),
        ];
        for (kind, expected) in cases {
            assert_eq!(principal_policy_name(&Principal::new(kind, "5")), expected);
        }
    }
}
