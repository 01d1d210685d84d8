//! reqwest-backed client for the store's HTTP API.
//!
//! Every request carries the bearer JWT and, when scoped, the
//! `X-Vault-Namespace` header. Error responses are turned into
//! [`Error::Store`] with the remote status and the store's own messages.

use super::store::{
    AuthRole, JwtTrust, PageRequest, SecretEntry, SecretMetadataRecord, SecretPage, SecretStore,
    StoredSecret,
};
use crate::config::VaultSettings;
use crate::domain::{CustomMetadata, SecretValue};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::policy::AclPolicy;
use crate::store_span;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const SECRET_VALUE_KEY: &str = "value";

/// Namespace-scoped store client.
///
/// Cloning and re-scoping share the underlying connection pool and never
/// touch the network.
#[derive(Clone)]
pub struct VaultClient {
    http: Client,
    address: Arc<str>,
    token: Arc<SecretValue>,
    namespace: Option<Arc<str>>,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    pub fn new(
        address: impl Into<String>,
        token: SecretValue,
        namespace: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::config("Store credential cannot be empty"));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build store HTTP client: {}", e)))?;
        let address: String = address.into();

        Ok(Self {
            http,
            address: Arc::from(address.trim_end_matches('/')),
            token: Arc::new(token),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(Arc::from),
            metrics: MetricsRecorder::new(),
        })
    }

    /// Build the root client from settings; the JWT is required.
    pub fn from_settings(settings: &VaultSettings) -> Result<Self> {
        let token = settings
            .jwt
            .as_deref()
            .map(SecretValue::new)
            .ok_or_else(|| Error::config("VAULTGATE_VAULT_JWT must be set to reach the store"))?;
        Self::new(&settings.address, token, settings.namespace.clone(), settings.timeout())
    }

    /// Same credential and transport, different namespace
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        Self {
            namespace: Some(namespace).filter(|ns| !ns.is_empty()).map(Arc::from),
            ..self.clone()
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Response> {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let mut builder =
            self.http.request(method, url).bearer_auth(self.token.expose_secret());
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, &**namespace);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }

        let span = store_span!(operation, path = %path, namespace = ?self.namespace);
        match builder.send().instrument(span).await {
            Ok(response) => {
                self.metrics.record_store_request(operation, Some(response.status().as_u16()));
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_store_request(operation, None);
                tracing::warn!(operation, path = %path, error = %e, "Store request failed");
                Err(Error::store(None, format!("{} request failed: {}", operation, e)))
            }
        }
    }

    /// Succeed on 2xx, otherwise convert the response into a store error
    async fn ensure_success(&self, operation: &'static str, response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(store_error(operation, response).await)
        }
    }

    /// Decode a JSON body, mapping 404 to `None`
    async fn read_optional<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        response: Response,
    ) -> Result<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.ensure_success(operation, response).await?;
        decode(operation, response).await.map(Some)
    }

    async fn auth_engine_exists(&self, mount: &str) -> Result<bool> {
        let response = self.execute("list_auth_engines", Method::GET, "sys/auth", &[], None).await?;
        let response = self.ensure_success("list_auth_engines", response).await?;
        let body: Value = decode("list_auth_engines", response).await?;

        let key = format!("{}/", mount.trim_matches('/'));
        let listed = |v: &Value| v.as_object().is_some_and(|map| map.contains_key(&key));
        Ok(body.get("data").is_some_and(listed) || listed(&body))
    }
}

async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::store(None, format!("{} response could not be read: {}", operation, e)))?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::serialization(e, format!("Failed to decode {} response", operation)))
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

async fn store_error(operation: &'static str, response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => format!("{} failed with status {}", operation, status),
    };
    tracing::debug!(operation, status = status.as_u16(), "Store returned an error response");
    Error::store(Some(status.as_u16()), message)
}

fn kv_path(mount: &str, kind: &str, path: &str) -> String {
    format!("{}/{}/{}", mount.trim_matches('/'), kind, path.trim_start_matches('/'))
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct KvReadData {
    data: Option<BTreeMap<String, Value>>,
    metadata: KvVersionMetadata,
}

#[derive(Deserialize)]
struct KvVersionMetadata {
    version: u64,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    custom_metadata: Option<CustomMetadata>,
}

#[derive(Deserialize)]
struct KvWriteData {
    version: u64,
}

#[derive(Deserialize)]
struct MetadataWire {
    #[serde(default)]
    custom_metadata: Option<CustomMetadata>,
    #[serde(default)]
    current_version: u64,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_time: Option<DateTime<Utc>>,
}

impl From<MetadataWire> for SecretMetadataRecord {
    fn from(wire: MetadataWire) -> Self {
        Self {
            custom_metadata: wire.custom_metadata.unwrap_or_default(),
            current_version: wire.current_version,
            created_at: wire.created_time,
            updated_at: wire.updated_time,
        }
    }
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    key_info: BTreeMap<String, MetadataWire>,
}

#[derive(Deserialize)]
struct PolicyData {
    #[serde(default)]
    policy: String,
}

#[async_trait]
impl SecretStore for VaultClient {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    async fn get_secret(&self, mount: &str, path: &str) -> Result<Option<StoredSecret>> {
        let api_path = kv_path(mount, "data", path);
        let response = self.execute("get_secret", Method::GET, &api_path, &[], None).await?;
        let Some(envelope) =
            self.read_optional::<DataEnvelope<KvReadData>>("get_secret", response).await?
        else {
            return Ok(None);
        };

        // a soft-deleted latest version has no data
        let Some(mut data) = envelope.data.data else {
            return Ok(None);
        };
        let value = match data.remove(SECRET_VALUE_KEY) {
            Some(Value::String(value)) => SecretValue::new(value),
            _ => {
                return Err(Error::internal(format!(
                    "Secret at {} has no string '{}' field",
                    api_path, SECRET_VALUE_KEY
                )))
            }
        };

        let metadata = envelope.data.metadata;
        Ok(Some(StoredSecret {
            value,
            custom_metadata: metadata.custom_metadata.unwrap_or_default(),
            version: metadata.version,
            created_at: metadata.created_time,
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
        let mut body = json!({ "data": { "value": value.expose_secret() } });
        if let Some(cas) = cas {
            body["options"] = json!({ "cas": cas });
        }

        let response = self
            .execute("update_secret", Method::POST, &kv_path(mount, "data", path), &[], Some(body))
            .await?;
        let response = self.ensure_success("update_secret", response).await?;
        let written: DataEnvelope<KvWriteData> = decode("update_secret", response).await?;

        self.update_secret_metadata(mount, path, metadata).await?;
        Ok(written.data.version)
    }

    async fn delete_secret(&self, mount: &str, path: &str) -> Result<()> {
        let response = self
            .execute("delete_secret", Method::DELETE, &kv_path(mount, "metadata", path), &[], None)
            .await?;
        self.ensure_success("delete_secret", response).await?;
        Ok(())
    }

    async fn list_secrets_page(
        &self,
        mount: &str,
        path: &str,
        page: &PageRequest,
    ) -> Result<SecretPage> {
        let list = Method::from_bytes(b"LIST")
            .map_err(|e| Error::internal(format!("LIST method unavailable: {}", e)))?;
        let mut query = vec![("limit", page.limit.to_string())];
        if let Some(after) = &page.after {
            query.push(("after", after.clone()));
        }

        let response = self
            .execute("list_secrets", list, &kv_path(mount, "detailed-metadata", path), &query, None)
            .await?;
        let Some(envelope) = self.read_optional::<DataEnvelope<ListData>>("list_secrets", response).await?
        else {
            return Ok(SecretPage::default());
        };

        let ListData { keys, mut key_info } = envelope.data;
        let next = if page.limit > 0 && keys.len() >= page.limit { keys.last().cloned() } else { None };
        let entries = keys
            .into_iter()
            .filter(|key| !key.ends_with('/'))
            .map(|key| {
                let metadata = key_info.remove(&key).map(SecretMetadataRecord::from).unwrap_or_default();
                SecretEntry { key, metadata }
            })
            .collect();

        Ok(SecretPage { entries, next })
    }

    async fn read_secret_metadata(
        &self,
        mount: &str,
        path: &str,
    ) -> Result<Option<SecretMetadataRecord>> {
        let response = self
            .execute("read_secret_metadata", Method::GET, &kv_path(mount, "metadata", path), &[], None)
            .await?;
        let envelope = self
            .read_optional::<DataEnvelope<MetadataWire>>("read_secret_metadata", response)
            .await?;
        Ok(envelope.map(|e| e.data.into()))
    }

    async fn update_secret_metadata(
        &self,
        mount: &str,
        path: &str,
        metadata: &CustomMetadata,
    ) -> Result<()> {
        let body = json!({ "custom_metadata": metadata });
        let response = self
            .execute(
                "update_secret_metadata",
                Method::POST,
                &kv_path(mount, "metadata", path),
                &[],
                Some(body),
            )
            .await?;
        self.ensure_success("update_secret_metadata", response).await?;
        Ok(())
    }

    async fn get_policy(&self, name: &str) -> Result<Option<AclPolicy>> {
        let path = format!("sys/policies/acl/{}", name);
        let response = self.execute("get_policy", Method::GET, &path, &[], None).await?;
        match self.read_optional::<DataEnvelope<PolicyData>>("get_policy", response).await? {
            Some(envelope) => AclPolicy::from_document(name, &envelope.data.policy).map(Some),
            None => Ok(None),
        }
    }

    async fn set_policy(&self, policy: &AclPolicy) -> Result<()> {
        let path = format!("sys/policies/acl/{}", policy.name);
        let body = json!({ "policy": policy.to_document()? });
        let response = self.execute("set_policy", Method::PUT, &path, &[], Some(body)).await?;
        self.ensure_success("set_policy", response).await?;
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> Result<()> {
        let path = format!("sys/policies/acl/{}", name);
        let response = self.execute("delete_policy", Method::DELETE, &path, &[], None).await?;
        self.ensure_success("delete_policy", response).await?;
        Ok(())
    }

    async fn enable_secrets_engine(&self, mount: &str, engine_type: &str) -> Result<()> {
        let path = format!("sys/mounts/{}", mount.trim_matches('/'));
        let body = json!({ "type": engine_type, "options": { "version": "2" } });
        let response =
            self.execute("enable_secrets_engine", Method::POST, &path, &[], Some(body)).await?;
        self.ensure_success("enable_secrets_engine", response).await?;
        Ok(())
    }

    async fn enable_auth_engine(
        &self,
        mount: &str,
        engine_type: &str,
        allow_existing: bool,
    ) -> Result<bool> {
        if allow_existing && self.auth_engine_exists(mount).await? {
            return Ok(false);
        }

        let path = format!("sys/auth/{}", mount.trim_matches('/'));
        let body = json!({ "type": engine_type });
        let response =
            self.execute("enable_auth_engine", Method::POST, &path, &[], Some(body)).await?;
        self.ensure_success("enable_auth_engine", response).await?;
        Ok(true)
    }

    async fn configure_jwt_trust(&self, mount: &str, trust: &JwtTrust) -> Result<()> {
        let path = format!("auth/{}/config", mount.trim_matches('/'));
        let body = match &trust.signing_key {
            Some(key) => json!({
                "bound_issuer": trust.issuer_url,
                "jwt_validation_pubkeys": [key],
            }),
            None => json!({
                "bound_issuer": trust.issuer_url,
                "oidc_discovery_url": trust.issuer_url,
            }),
        };
        let response =
            self.execute("configure_jwt_trust", Method::POST, &path, &[], Some(body)).await?;
        self.ensure_success("configure_jwt_trust", response).await?;
        Ok(())
    }

    async fn get_role(&self, mount: &str, role: &str) -> Result<Option<AuthRole>> {
        let path = format!("auth/{}/role/{}", mount.trim_matches('/'), role);
        let response = self.execute("get_role", Method::GET, &path, &[], None).await?;
        let envelope = self.read_optional::<DataEnvelope<AuthRole>>("get_role", response).await?;
        Ok(envelope.map(|e| e.data))
    }

    async fn update_role(&self, mount: &str, role: &str, config: &AuthRole) -> Result<()> {
        let path = format!("auth/{}/role/{}", mount.trim_matches('/'), role);
        let body = serde_json::to_value(config)?;
        let response = self.execute("update_role", Method::POST, &path, &[], Some(body)).await?;
        self.ensure_success("update_role", response).await?;
        Ok(())
    }
}
