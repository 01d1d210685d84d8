//! Store capability trait and the wire-level records it exchanges.

use crate::domain::{CustomMetadata, SecretValue};
use crate::errors::Result;
use crate::policy::AclPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current value of a secret together with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
    pub value: SecretValue,
    pub custom_metadata: CustomMetadata,
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Version-independent metadata of a secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadataRecord {
    #[serde(default)]
    pub custom_metadata: CustomMetadata,
    #[serde(default)]
    pub current_version: u64,
    #[serde(default, rename = "created_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updated_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One entry of a secrets listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    /// Key relative to the listed directory
    pub key: String,
    pub metadata: SecretMetadataRecord,
}

/// Cursor for one page of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Return only keys strictly after this one
    pub after: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretPage {
    pub entries: Vec<SecretEntry>,
    /// Key to resume after, `None` once the listing is exhausted
    pub next: Option<String>,
}

/// Trust relationship between a JWT auth engine and the token issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtTrust {
    pub issuer_url: String,
    pub signing_key: Option<String>,
}

/// Auth role configuration on a JWT auth engine.
///
/// Fields this crate does not manage are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthRole {
    #[serde(default)]
    pub role_type: String,
    #[serde(default)]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub token_policies_template_claims: bool,
    #[serde(default)]
    pub bound_claims: BTreeMap<String, Value>,
    #[serde(default)]
    pub bound_audiences: Vec<String>,
    #[serde(default)]
    pub user_claim: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AuthRole {
    /// Compare the managed fields only
    pub fn same_managed_fields(&self, other: &AuthRole) -> bool {
        let mut mine = self.token_policies.clone();
        let mut theirs = other.token_policies.clone();
        mine.sort();
        theirs.sort();

        let mut audiences = self.bound_audiences.clone();
        let mut other_audiences = other.bound_audiences.clone();
        audiences.sort();
        other_audiences.sort();

        self.role_type == other.role_type
            && mine == theirs
            && self.token_policies_template_claims == other.token_policies_template_claims
            && self.bound_claims == other.bound_claims
            && audiences == other_audiences
            && self.user_claim == other.user_claim
            && self.token_type == other.token_type
    }
}

/// Namespace-scoped access to the external secret store.
///
/// Implementations never interpret store semantics: every remote failure is
/// returned as [`crate::errors::Error::Store`] carrying the remote status and
/// message, and callers classify it.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Namespace every call is made in, if any
    fn namespace(&self) -> Option<&str>;

    /// Latest version of a secret, `None` when absent
    async fn get_secret(&self, mount: &str, path: &str) -> Result<Option<StoredSecret>>;

    /// Write a new version of a secret value and replace its custom metadata.
    ///
    /// `cas` is passed through as the check-and-set version: `Some(0)` only
    /// succeeds for a path with no versions. Returns the written version.
    async fn update_secret(
        &self,
        mount: &str,
        path: &str,
        value: &SecretValue,
        metadata: &CustomMetadata,
        cas: Option<u64>,
    ) -> Result<u64>;

    /// Delete a secret with all its versions and metadata
    async fn delete_secret(&self, mount: &str, path: &str) -> Result<()>;

    /// One page of the secrets under a directory, with their metadata
    async fn list_secrets_page(
        &self,
        mount: &str,
        path: &str,
        page: &PageRequest,
    ) -> Result<SecretPage>;

    async fn read_secret_metadata(
        &self,
        mount: &str,
        path: &str,
    ) -> Result<Option<SecretMetadataRecord>>;

    /// Replace custom metadata without writing a new version. No CAS.
    async fn update_secret_metadata(
        &self,
        mount: &str,
        path: &str,
        metadata: &CustomMetadata,
    ) -> Result<()>;

    async fn get_policy(&self, name: &str) -> Result<Option<AclPolicy>>;

    async fn set_policy(&self, policy: &AclPolicy) -> Result<()>;

    async fn delete_policy(&self, name: &str) -> Result<()>;

    /// Mount a KV-v2 secrets engine
    async fn enable_secrets_engine(&self, mount: &str, engine_type: &str) -> Result<()>;

    /// Mount an auth engine. Returns `true` when it was created by this call,
    /// `false` when `allow_existing` and it already existed.
    async fn enable_auth_engine(
        &self,
        mount: &str,
        engine_type: &str,
        allow_existing: bool,
    ) -> Result<bool>;

    async fn configure_jwt_trust(&self, mount: &str, trust: &JwtTrust) -> Result<()>;

    async fn get_role(&self, mount: &str, role: &str) -> Result<Option<AuthRole>>;

    /// Create or replace a role
    async fn update_role(&self, mount: &str, role: &str, config: &AuthRole) -> Result<()>;
}
