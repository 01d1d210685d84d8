//! Repository traits for the local records this crate reads and writes.
//!
//! Persistence of these records lives outside the crate; embedding
//! processes implement the traits over their own database.

use crate::domain::{RotationReminder, TenantId, TenantSecretsConfig};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait TenantConfigRepository: Send + Sync {
    async fn get(&self, tenant: &TenantId) -> Result<Option<TenantSecretsConfig>>;

    /// Insert the configuration unless one already exists for the tenant;
    /// returns the stored configuration either way.
    async fn create_if_absent(&self, config: TenantSecretsConfig) -> Result<TenantSecretsConfig>;

    /// Set the `active` flag. Returns `false` when it was already set.
    async fn mark_active(&self, tenant: &TenantId) -> Result<bool>;
}

#[async_trait]
pub trait RotationReminderRepository: Send + Sync {
    /// Up to `limit` reminders due at `now` with no notification sent yet,
    /// oldest due first (ties broken by id)
    async fn due_batch(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<RotationReminder>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Record a dispatched reminder
    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Push a reminder's due time back to `until`
    async fn defer(&self, id: i64, until: DateTime<Utc>) -> Result<()>;
}
