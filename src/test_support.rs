//! Test doubles shared by unit tests.

use crate::domain::{CustomMetadata, SecretValue, TenantSecretsConfig};
use crate::errors::{Error, Result};
use crate::policy::AclPolicy;
use crate::vault::{
    AuthRole, JwtTrust, PageRequest, SecretEntry, SecretMetadataRecord, SecretPage, SecretStore,
    StoreFactory, StoredSecret,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

const CAS_MISMATCH: &str = "check-and-set parameter did not match the current version";

#[derive(Debug, Clone)]
struct FakeSecret {
    value: SecretValue,
    custom_metadata: CustomMetadata,
    version: u64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Failure {
    operation: String,
    path: Option<String>,
    status: Option<u16>,
    message: String,
}

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<(String, String), FakeSecret>,
    policies: BTreeMap<String, AclPolicy>,
    mounts: BTreeSet<String>,
    auth_engines: BTreeSet<String>,
    jwt_trust: BTreeMap<String, JwtTrust>,
    roles: BTreeMap<(String, String), AuthRole>,
    calls: Vec<String>,
    mutations: usize,
    failures: Vec<Failure>,
}

/// In-memory store emulating the KV-v2, policy and auth endpoints.
///
/// Conflicts are reported with the same error text the real store uses so
/// callers exercise their classification paths.
#[derive(Debug, Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

fn key(mount: &str, path: &str) -> (String, String) {
    (mount.trim_matches('/').to_string(), path.trim_start_matches('/').to_string())
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call to `operation` with the given status and message
    pub fn fail_on(&self, operation: &str, status: Option<u16>, message: &str) {
        self.push_failure(operation, None, status, message);
    }

    /// Fail calls to `operation` that target `path` (a secret path or policy name)
    pub fn fail_on_path(&self, operation: &str, path: &str, status: Option<u16>, message: &str) {
        self.push_failure(operation, Some(path), status, message);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    fn push_failure(&self, operation: &str, path: Option<&str>, status: Option<u16>, message: &str) {
        self.state.lock().unwrap().failures.push(Failure {
            operation: operation.to_string(),
            path: path.map(str::to_string),
            status,
            message: message.to_string(),
        });
    }

    /// Record the call and apply any matching injected failure
    fn enter(&self, operation: &str, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        let failure = state.failures.iter().find(|f| {
            f.operation == operation && f.path.as_deref().map_or(true, |p| p == path)
        });
        match failure {
            Some(f) => Err(Error::store(f.status, f.message.clone())),
            None => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_named(&self, operation: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| *c == operation).count()
    }

    /// Number of calls that changed store state
    pub fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }

    pub fn reset_counters(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.mutations = 0;
    }

    pub fn secret_value(&self, mount: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.secrets.get(&key(mount, path)).map(|s| s.value.expose_secret().to_string())
    }

    pub fn secret_metadata(&self, mount: &str, path: &str) -> Option<CustomMetadata> {
        let state = self.state.lock().unwrap();
        state.secrets.get(&key(mount, path)).map(|s| s.custom_metadata.clone())
    }

    pub fn policy(&self, name: &str) -> Option<AclPolicy> {
        self.state.lock().unwrap().policies.get(name).cloned()
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.state.lock().unwrap().policies.keys().cloned().collect()
    }

    pub fn insert_policy(&self, policy: AclPolicy) {
        self.state.lock().unwrap().policies.insert(policy.name.clone(), policy);
    }

    pub fn role(&self, mount: &str, role: &str) -> Option<AuthRole> {
        self.state.lock().unwrap().roles.get(&key(mount, role)).cloned()
    }

    pub fn insert_role(&self, mount: &str, role: &str, config: AuthRole) {
        self.state.lock().unwrap().roles.insert(key(mount, role), config);
    }

    pub fn has_mount(&self, mount: &str) -> bool {
        self.state.lock().unwrap().mounts.contains(mount.trim_matches('/'))
    }

    pub fn insert_mount(&self, mount: &str) {
        self.state.lock().unwrap().mounts.insert(mount.trim_matches('/').to_string());
    }

    pub fn has_auth_engine(&self, mount: &str) -> bool {
        self.state.lock().unwrap().auth_engines.contains(mount.trim_matches('/'))
    }

    pub fn jwt_trust(&self, mount: &str) -> Option<JwtTrust> {
        self.state.lock().unwrap().jwt_trust.get(mount.trim_matches('/')).cloned()
    }
}

#[async_trait]
impl SecretStore for FakeStore {
    fn namespace(&self) -> Option<&str> {
        None
    }

    async fn get_secret(&self, mount: &str, path: &str) -> Result<Option<StoredSecret>> {
        self.enter("get_secret", path)?;
        let state = self.state.lock().unwrap();
        Ok(state.secrets.get(&key(mount, path)).map(|s| StoredSecret {
            value: s.value.clone(),
            custom_metadata: s.custom_metadata.clone(),
            version: s.version,
            created_at: Some(s.created_at),
        }))
    }

    async fn update_secret(
        &self,
        mount: &str,
        path: &str,
        value: &SecretValue,
        metadata: &CustomMetadata,
        cas: Option<u64>,
    ) -> Result<u64> {
        self.enter("update_secret", path)?;
        let version = {
            let mut state = self.state.lock().unwrap();
            let existing = state.secrets.get(&key(mount, path));
            let current = existing.map_or(0, |s| s.version);
            if let Some(expected) = cas {
                if expected != current {
                    return Err(Error::store(Some(400), CAS_MISMATCH));
                }
            }

            // data and metadata are separate writes, as on the real store
            let created_at = existing.map_or_else(Utc::now, |s| s.created_at);
            let custom_metadata = existing.map(|s| s.custom_metadata.clone()).unwrap_or_default();
            let version = current + 1;
            state.secrets.insert(
                key(mount, path),
                FakeSecret { value: value.clone(), custom_metadata, version, created_at },
            );
            state.mutations += 1;
            version
        };

        self.update_secret_metadata(mount, path, metadata).await?;
        Ok(version)
    }

    async fn delete_secret(&self, mount: &str, path: &str) -> Result<()> {
        self.enter("delete_secret", path)?;
        let mut state = self.state.lock().unwrap();
        if state.secrets.remove(&key(mount, path)).is_some() {
            state.mutations += 1;
        }
        Ok(())
    }

    async fn list_secrets_page(
        &self,
        mount: &str,
        path: &str,
        page: &PageRequest,
    ) -> Result<SecretPage> {
        self.enter("list_secrets_page", path)?;
        let state = self.state.lock().unwrap();
        let mount = mount.trim_matches('/');
        let prefix = path.trim_start_matches('/');

        let entries: Vec<SecretEntry> = state
            .secrets
            .iter()
            .filter(|((m, _), _)| m == mount)
            .filter_map(|((_, p), s)| p.strip_prefix(prefix).map(|k| (k, s)))
            .filter(|(k, _)| !k.is_empty() && !k.contains('/'))
            .filter(|(k, _)| page.after.as_deref().map_or(true, |after| *k > after))
            .take(page.limit)
            .map(|(k, s)| SecretEntry {
                key: k.to_string(),
                metadata: SecretMetadataRecord {
                    custom_metadata: s.custom_metadata.clone(),
                    current_version: s.version,
                    created_at: Some(s.created_at),
                    updated_at: None,
                },
            })
            .collect();

        let next = if entries.len() >= page.limit { entries.last().map(|e| e.key.clone()) } else { None };
        Ok(SecretPage { entries, next })
    }

    async fn read_secret_metadata(
        &self,
        mount: &str,
        path: &str,
    ) -> Result<Option<SecretMetadataRecord>> {
        self.enter("read_secret_metadata", path)?;
        let state = self.state.lock().unwrap();
        Ok(state.secrets.get(&key(mount, path)).map(|s| SecretMetadataRecord {
            custom_metadata: s.custom_metadata.clone(),
            current_version: s.version,
            created_at: Some(s.created_at),
            updated_at: None,
        }))
    }

    async fn update_secret_metadata(
        &self,
        mount: &str,
        path: &str,
        metadata: &CustomMetadata,
    ) -> Result<()> {
        self.enter("update_secret_metadata", path)?;
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        match state.secrets.get_mut(&key(mount, path)) {
            Some(secret) => {
                secret.custom_metadata = metadata.clone();
                state.mutations += 1;
                Ok(())
            }
            None => Err(Error::store(Some(404), "no secret at path")),
        }
    }

    async fn get_policy(&self, name: &str) -> Result<Option<AclPolicy>> {
        self.enter("get_policy", name)?;
        Ok(self.state.lock().unwrap().policies.get(name).cloned())
    }

    async fn set_policy(&self, policy: &AclPolicy) -> Result<()> {
        self.enter("set_policy", &policy.name)?;
        let mut state = self.state.lock().unwrap();
        state.policies.insert(policy.name.clone(), policy.clone());
        state.mutations += 1;
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> Result<()> {
        self.enter("delete_policy", name)?;
        let mut state = self.state.lock().unwrap();
        if state.policies.remove(name).is_some() {
            state.mutations += 1;
        }
        Ok(())
    }

    async fn enable_secrets_engine(&self, mount: &str, _engine_type: &str) -> Result<()> {
        self.enter("enable_secrets_engine", mount)?;
        let mut state = self.state.lock().unwrap();
        let mount = mount.trim_matches('/').to_string();
        if state.mounts.contains(&mount) {
            return Err(Error::store(
                Some(400),
                format!("existing mount at {}/: path is already in use at {}/", mount, mount),
            ));
        }
        state.mounts.insert(mount);
        state.mutations += 1;
        Ok(())
    }

    async fn enable_auth_engine(
        &self,
        mount: &str,
        _engine_type: &str,
        allow_existing: bool,
    ) -> Result<bool> {
        self.enter("enable_auth_engine", mount)?;
        let mut state = self.state.lock().unwrap();
        let mount = mount.trim_matches('/').to_string();
        if state.auth_engines.contains(&mount) {
            if allow_existing {
                return Ok(false);
            }
            return Err(Error::store(Some(400), format!("path is already in use at {}/", mount)));
        }
        state.auth_engines.insert(mount);
        state.mutations += 1;
        Ok(true)
    }

    async fn configure_jwt_trust(&self, mount: &str, trust: &JwtTrust) -> Result<()> {
        self.enter("configure_jwt_trust", mount)?;
        let mut state = self.state.lock().unwrap();
        state.jwt_trust.insert(mount.trim_matches('/').to_string(), trust.clone());
        state.mutations += 1;
        Ok(())
    }

    async fn get_role(&self, mount: &str, role: &str) -> Result<Option<AuthRole>> {
        self.enter("get_role", role)?;
        Ok(self.state.lock().unwrap().roles.get(&key(mount, role)).cloned())
    }

    async fn update_role(&self, mount: &str, role: &str, config: &AuthRole) -> Result<()> {
        self.enter("update_role", role)?;
        let mut state = self.state.lock().unwrap();
        state.roles.insert(key(mount, role), config.clone());
        state.mutations += 1;
        Ok(())
    }
}

/// Hands out the same [`FakeStore`] for every tenant, recording the
/// namespaces requested
#[derive(Debug, Default)]
pub struct FakeStoreFactory {
    pub store: Arc<FakeStore>,
    namespaces: Mutex<Vec<String>>,
}

impl FakeStoreFactory {
    pub fn new(store: Arc<FakeStore>) -> Self {
        Self { store, namespaces: Mutex::new(Vec::new()) }
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.lock().unwrap().clone()
    }
}

impl StoreFactory for FakeStoreFactory {
    fn store_for(&self, config: &TenantSecretsConfig) -> Result<Arc<dyn SecretStore>> {
        self.namespaces.lock().unwrap().push(config.full_namespace_path());
        Ok(self.store.clone())
    }
}
