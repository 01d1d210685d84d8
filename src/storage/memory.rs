//! In-memory repositories for tests and single-process embedding.

use super::repository::{RotationReminderRepository, TenantConfigRepository};
use crate::domain::{RotationReminder, TenantId, TenantSecretsConfig};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTenantConfigRepository {
    configs: Arc<RwLock<HashMap<TenantId, TenantSecretsConfig>>>,
}

impl InMemoryTenantConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, config: TenantSecretsConfig) {
        self.configs.write().await.insert(config.tenant, config);
    }
}

#[async_trait]
impl TenantConfigRepository for InMemoryTenantConfigRepository {
    async fn get(&self, tenant: &TenantId) -> Result<Option<TenantSecretsConfig>> {
        Ok(self.configs.read().await.get(tenant).cloned())
    }

    async fn create_if_absent(&self, config: TenantSecretsConfig) -> Result<TenantSecretsConfig> {
        let mut configs = self.configs.write().await;
        Ok(configs.entry(config.tenant).or_insert(config).clone())
    }

    async fn mark_active(&self, tenant: &TenantId) -> Result<bool> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(tenant)
            .ok_or_else(|| Error::not_found("secrets_config", tenant.to_string()))?;
        if config.active {
            return Ok(false);
        }
        config.active = true;
        Ok(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRotationReminderRepository {
    reminders: Arc<RwLock<BTreeMap<i64, RotationReminder>>>,
}

impl InMemoryRotationReminderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, reminder: RotationReminder) {
        self.reminders.write().await.insert(reminder.id, reminder);
    }

    pub async fn get(&self, id: i64) -> Option<RotationReminder> {
        self.reminders.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.reminders.read().await.len()
    }
}

#[async_trait]
impl RotationReminderRepository for InMemoryRotationReminderRepository {
    async fn due_batch(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<RotationReminder>> {
        let reminders = self.reminders.read().await;
        let mut due: Vec<_> = reminders.values().filter(|r| r.is_due(now)).cloned().collect();
        due.sort_by_key(|r| (r.next_reminder_at, r.id));
        due.truncate(limit);
        Ok(due)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.reminders.write().await.remove(&id);
        Ok(())
    }

    async fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("rotation_reminder", id.to_string()))?;
        reminder.notification_sent = true;
        reminder.last_reminder_at = Some(at);
        Ok(())
    }

    async fn defer(&self, id: i64, until: DateTime<Utc>) -> Result<()> {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("rotation_reminder", id.to_string()))?;
        reminder.next_reminder_at = until;
        Ok(())
    }
}
