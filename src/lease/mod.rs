//! # Exclusive Leases
//!
//! Tenant-scoped mutual exclusion for policy read-modify-write cycles. The
//! store offers no atomic multi-path policy update, so concurrent grants on
//! one tenant are serialized here. Acquisition never waits: contention is
//! reported immediately and the caller decides whether to retry.

use crate::domain::TenantId;
use crate::errors::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Lease scope for policy updates of one tenant
pub fn policy_scope(tenant: &TenantId) -> String {
    format!("secrets_manager:policies:{}", tenant)
}

/// Non-blocking exclusive lease capability
pub trait LeaseProvider: Send + Sync {
    /// Acquire `scope` or fail with [`Error::LeaseContention`]
    fn try_acquire(&self, scope: &str) -> Result<LeaseGuard>;

    /// Release a lease; only the holder's token releases it
    fn release(&self, scope: &str, token: Uuid);
}

/// Held lease, released on drop
pub struct LeaseGuard {
    scope: String,
    token: Uuid,
    provider: Arc<dyn LeaseProvider>,
}

impl LeaseGuard {
    pub fn new(scope: impl Into<String>, token: Uuid, provider: Arc<dyn LeaseProvider>) -> Self {
        Self { scope: scope.into(), token, provider }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl std::fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard").field("scope", &self.scope).field("token", &self.token).finish()
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.provider.release(&self.scope, self.token);
        tracing::trace!(scope = %self.scope, "Lease released");
    }
}

/// In-process leases, suitable when one process owns all policy updates
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseProvider {
    held: Arc<DashMap<String, Uuid>>,
}

impl InMemoryLeaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, scope: &str) -> bool {
        self.held.contains_key(scope)
    }
}

impl LeaseProvider for InMemoryLeaseProvider {
    fn try_acquire(&self, scope: &str) -> Result<LeaseGuard> {
        match self.held.entry(scope.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!(scope, "Lease contention");
                Err(Error::lease_contention(scope))
            }
            Entry::Vacant(vacant) => {
                let token = Uuid::new_v4();
                vacant.insert(token);
                Ok(LeaseGuard::new(scope, token, Arc::new(self.clone())))
            }
        }
    }

    fn release(&self, scope: &str, token: Uuid) {
        self.held.remove_if(scope, |_, holder| *holder == token);
    }
}
