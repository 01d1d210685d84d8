//! Rotation reminder batch job.
//!
//! Reminders live in the local database while the secrets they point at
//! live in the store, with no foreign key between them. Each invocation
//! examines one bounded batch of due reminders, deletes the ones whose
//! secret is gone or superseded, and dispatches the rest.

use crate::domain::secret::rotation_info_id;
use crate::config::ReconcilerSettings;
use crate::domain::RotationReminder;
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::{RotationReminderRepository, TenantConfigRepository};
use crate::vault::StoreFactory;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Delivers a rotation reminder; delivery mechanics are the implementor's
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn notify(&self, reminder: &RotationReminder) -> Result<()>;
}

/// Notifier that only logs, for deployments without a delivery channel
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ReminderNotifier for LoggingNotifier {
    async fn notify(&self, reminder: &RotationReminder) -> Result<()> {
        tracing::info!(
            reminder_id = reminder.id,
            tenant = %reminder.tenant,
            secret = %reminder.secret_name,
            "Secret rotation due"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Reminders dispatched and marked as sent
    pub processed_count: usize,
    /// Orphaned reminders deleted
    pub skipped_count: usize,
    /// Reminders deferred after a per-record failure
    pub failed_count: usize,
}

/// Why a reminder no longer applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanReason {
    InactiveConfig,
    SecretMissing,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Due,
    Orphaned(OrphanReason),
}

pub struct RotationReminderReconciler {
    reminders: Arc<dyn RotationReminderRepository>,
    configs: Arc<dyn TenantConfigRepository>,
    stores: Arc<dyn StoreFactory>,
    notifier: Arc<dyn ReminderNotifier>,
    batch_size: usize,
    retry_backoff: Duration,
    metrics: MetricsRecorder,
}

impl RotationReminderReconciler {
    pub fn new(
        reminders: Arc<dyn RotationReminderRepository>,
        configs: Arc<dyn TenantConfigRepository>,
        stores: Arc<dyn StoreFactory>,
        notifier: Arc<dyn ReminderNotifier>,
        batch_size: usize,
    ) -> Self {
        Self {
            reminders,
            configs,
            stores,
            notifier,
            batch_size: batch_size.max(1),
            retry_backoff: Duration::hours(1),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn from_settings(
        reminders: Arc<dyn RotationReminderRepository>,
        configs: Arc<dyn TenantConfigRepository>,
        stores: Arc<dyn StoreFactory>,
        notifier: Arc<dyn ReminderNotifier>,
        settings: &ReconcilerSettings,
    ) -> Self {
        Self::new(reminders, configs, stores, notifier, settings.batch_size)
            .with_retry_backoff(settings.retry_backoff())
    }

    /// How long a reminder that failed to process waits before it is due again
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Process one batch of reminders due at `now`.
    ///
    /// Store responses for a single record are counted as failures, the
    /// record is deferred by the retry backoff and the batch moves on, so a
    /// failing record never pins the head of later batches. An unreachable
    /// store or a repository failure aborts the batch; records already
    /// handled stay handled, so re-running is safe.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let batch = self.reminders.due_batch(now, self.batch_size).await?;
        let mut report = ReconcileReport::default();

        for reminder in &batch {
            match self.classify(reminder).await {
                Ok(Classification::Orphaned(reason)) => {
                    self.reminders.delete(reminder.id).await?;
                    report.skipped_count += 1;
                    tracing::info!(
                        reminder_id = reminder.id,
                        secret = %reminder.secret_name,
                        ?reason,
                        "Deleted orphaned rotation reminder"
                    );
                }
                Ok(Classification::Due) => match self.notifier.notify(reminder).await {
                    Ok(()) => {
                        self.reminders.mark_notified(reminder.id, now).await?;
                        report.processed_count += 1;
                    }
                    Err(e) => {
                        tracing::warn!(reminder_id = reminder.id, error = %e, "Reminder notification failed");
                        self.defer(reminder, now).await?;
                        report.failed_count += 1;
                    }
                },
                Err(e @ Error::Store { status: Some(_), .. }) => {
                    tracing::warn!(reminder_id = reminder.id, error = %e, "Could not classify rotation reminder");
                    self.defer(reminder, now).await?;
                    report.failed_count += 1;
                }
                Err(e) => {
                    tracing::error!(reminder_id = reminder.id, error = %e, "Aborting rotation reminder batch");
                    self.record(&report);
                    return Err(e);
                }
            }
        }

        self.record(&report);
        tracing::info!(
            batch = batch.len(),
            processed = report.processed_count,
            skipped = report.skipped_count,
            failed = report.failed_count,
            "Rotation reminder batch finished"
        );
        Ok(report)
    }

    /// Decide whether a reminder still refers to a live secret.
    ///
    /// A missing secret is the orphan signal, not an error.
    pub async fn classify(&self, reminder: &RotationReminder) -> Result<Classification> {
        let config = match self.configs.get(&reminder.tenant).await? {
            Some(config) if config.active => config,
            _ => return Ok(Classification::Orphaned(OrphanReason::InactiveConfig)),
        };

        let store = self.stores.store_for(&config)?;
        let path = config.secret_path(&reminder.secret_name);
        let Some(metadata) = store.read_secret_metadata(&config.mount, &path).await? else {
            return Ok(Classification::Orphaned(OrphanReason::SecretMissing));
        };

        if reminder.matches_reference(rotation_info_id(&metadata.custom_metadata)) {
            Ok(Classification::Due)
        } else {
            Ok(Classification::Orphaned(OrphanReason::Superseded))
        }
    }

    async fn defer(&self, reminder: &RotationReminder, now: DateTime<Utc>) -> Result<()> {
        let until = now + self.retry_backoff;
        self.reminders.defer(reminder.id, until).await?;
        tracing::debug!(reminder_id = reminder.id, %until, "Deferred rotation reminder");
        Ok(())
    }

    fn record(&self, report: &ReconcileReport) {
        self.metrics.record_reminder_batch(
            report.processed_count,
            report.skipped_count,
            report.failed_count,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomMetadata, SecretValue, TenantId, TenantSecretsConfig};
    use crate::storage::{InMemoryRotationReminderRepository, InMemoryTenantConfigRepository};
    use crate::test_support::{FakeStore, FakeStoreFactory};
    use crate::vault::SecretStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<i64>>,
        fail_for: Option<i64>,
    }

    #[async_trait]
    impl ReminderNotifier for RecordingNotifier {
        async fn notify(&self, reminder: &RotationReminder) -> Result<()> {
            if self.fail_for == Some(reminder.id) {
                return Err(Error::internal("mail relay down"));
            }
            self.sent.lock().unwrap().push(reminder.id);
            Ok(())
        }
    }

    struct Harness {
        reconciler: RotationReminderReconciler,
        store: Arc<FakeStore>,
        reminders: Arc<InMemoryRotationReminderRepository>,
        notifier: Arc<RecordingNotifier>,
        configs: Arc<InMemoryTenantConfigRepository>,
    }

    async fn harness(notifier: RecordingNotifier) -> Harness {
        harness_with_batch(notifier, 10).await
    }

    async fn harness_with_batch(notifier: RecordingNotifier, batch_size: usize) -> Harness {
        let store = Arc::new(FakeStore::new());
        let reminders = Arc::new(InMemoryRotationReminderRepository::new());
        let configs = Arc::new(InMemoryTenantConfigRepository::new());
        let notifier = Arc::new(notifier);

        let mut config = TenantSecretsConfig::new(TenantId::project(1), "group_1");
        config.active = true;
        configs.insert(config).await;

        let reconciler = RotationReminderReconciler::new(
            reminders.clone(),
            configs.clone(),
            Arc::new(FakeStoreFactory::new(store.clone())),
            notifier.clone(),
            batch_size,
        );
        Harness { reconciler, store, reminders, notifier, configs }
    }

    async fn put_secret(store: &FakeStore, name: &str, rotation_id: &str) {
        let mut metadata = CustomMetadata::new();
        metadata.insert("environment".to_string(), "production".to_string());
        metadata.insert("branch".to_string(), "main".to_string());
        metadata.insert("rotation_info_id".to_string(), rotation_id.to_string());
        store
            .update_secret("secrets/kv", &format!("explicit/{name}"), &SecretValue::new("v"), &metadata, None)
            .await
            .unwrap();
    }

    fn due(id: i64, secret: &str) -> RotationReminder {
        RotationReminder::new(id, TenantId::project(1), secret, Utc::now() - Duration::hours(1))
    }

    #[tokio::test]
    async fn test_superseded_reminder_is_deleted() {
        let h = harness(RecordingNotifier::default()).await;
        put_secret(&h.store, "S", "7").await;
        h.reminders.insert(due(42, "S")).await;

        let report = h.reconciler.run(Utc::now()).await.unwrap();
        assert_eq!(report, ReconcileReport { processed_count: 0, skipped_count: 1, failed_count: 0 });
        assert!(h.reminders.get(42).await.is_none());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_reminder_is_dispatched() {
        let h = harness(RecordingNotifier::default()).await;
        put_secret(&h.store, "db", "5").await;
        h.reminders.insert(due(5, "db")).await;

        let now = Utc::now();
        let report = h.reconciler.run(now).await.unwrap();
        assert_eq!(report.processed_count, 1);
        assert_eq!(*h.notifier.sent.lock().unwrap(), [5]);

        let stored = h.reminders.get(5).await.unwrap();
        assert!(stored.notification_sent);
        assert_eq!(stored.last_reminder_at, Some(now));

        // already sent, nothing left to do
        let report = h.reconciler.run(Utc::now()).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_missing_secret_and_inactive_tenant_are_orphans() {
        let h = harness(RecordingNotifier::default()).await;
        h.reminders.insert(due(1, "gone")).await;
        h.reminders
            .insert(RotationReminder::new(2, TenantId::project(99), "db", Utc::now() - Duration::hours(2)))
            .await;
        let inactive = TenantSecretsConfig::new(TenantId::group(3), "group_3");
        h.configs.insert(inactive).await;
        h.reminders
            .insert(RotationReminder::new(3, TenantId::group(3), "db", Utc::now() - Duration::hours(3)))
            .await;

        let report = h.reconciler.run(Utc::now()).await.unwrap();
        assert_eq!(report.skipped_count, 3);
        assert_eq!(h.reminders.len().await, 0);
        // inactive tenants never reach the store
        assert_eq!(h.store.calls_named("read_secret_metadata"), 1);
    }

    #[tokio::test]
    async fn test_per_record_failures_are_isolated() {
        let h = harness(RecordingNotifier { fail_for: Some(3), ..Default::default() }).await;
        put_secret(&h.store, "a", "1").await;
        put_secret(&h.store, "b", "2").await;
        put_secret(&h.store, "c", "3").await;
        h.store.fail_on_path("read_secret_metadata", "explicit/a", Some(403), "permission denied");
        h.reminders.insert(due(1, "a")).await;
        h.reminders.insert(due(2, "b")).await;
        h.reminders.insert(due(3, "c")).await;

        let now = Utc::now();
        let report = h.reconciler.run(now).await.unwrap();
        assert_eq!(report, ReconcileReport { processed_count: 1, skipped_count: 0, failed_count: 2 });

        let failed = h.reminders.get(1).await.unwrap();
        assert!(!failed.notification_sent);
        assert_eq!(failed.next_reminder_at, now + Duration::hours(1));
        assert!(!h.reminders.get(3).await.unwrap().notification_sent);
    }

    #[tokio::test]
    async fn test_failing_head_does_not_block_later_reminders() {
        let h = harness_with_batch(RecordingNotifier::default(), 1).await;
        put_secret(&h.store, "a", "1").await;
        put_secret(&h.store, "b", "2").await;
        h.store.fail_on_path("read_secret_metadata", "explicit/a", Some(403), "permission denied");
        h.reminders
            .insert(RotationReminder::new(1, TenantId::project(1), "a", Utc::now() - Duration::hours(3)))
            .await;
        h.reminders.insert(due(2, "b")).await;

        let now = Utc::now();
        let first = h.reconciler.run(now).await.unwrap();
        assert_eq!(first, ReconcileReport { processed_count: 0, skipped_count: 0, failed_count: 1 });

        let second = h.reconciler.run(now).await.unwrap();
        assert_eq!(second.processed_count, 1);
        assert!(h.reminders.get(2).await.unwrap().notification_sent);
        assert_eq!(*h.notifier.sent.lock().unwrap(), [2]);

        // the deferred head comes back once its backoff elapses
        h.store.clear_failures();
        let retry = h.reconciler.run(now + Duration::hours(2)).await.unwrap();
        assert_eq!(retry.processed_count, 1);
        assert!(h.reminders.get(1).await.unwrap().notification_sent);
    }

    #[tokio::test]
    async fn test_retry_backoff_is_configurable() {
        let mut h = harness(RecordingNotifier { fail_for: Some(1), ..Default::default() }).await;
        let settings = ReconcilerSettings { batch_size: 10, retry_backoff_minutes: 5 };
        h.reconciler = RotationReminderReconciler::from_settings(
            h.reminders.clone(),
            h.configs.clone(),
            Arc::new(FakeStoreFactory::new(h.store.clone())),
            h.notifier.clone(),
            &settings,
        );
        put_secret(&h.store, "a", "1").await;
        h.reminders.insert(due(1, "a")).await;

        let now = Utc::now();
        let report = h.reconciler.run(now).await.unwrap();
        assert_eq!(report.failed_count, 1);
        assert_eq!(h.reminders.get(1).await.unwrap().next_reminder_at, now + Duration::minutes(5));
        assert_eq!(h.reconciler.run(now + Duration::minutes(1)).await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts_batch() {
        let h = harness(RecordingNotifier::default()).await;
        put_secret(&h.store, "a", "1").await;
        h.store.fail_on("read_secret_metadata", None, "connection refused");
        h.reminders.insert(due(1, "a")).await;

        let err = h.reconciler.run(Utc::now()).await.unwrap_err();
        assert!(err.is_unreachable());
        assert!(h.reminders.get(1).await.is_some());
    }

    #[tokio::test]
    async fn test_batch_is_bounded() {
        let h = harness(RecordingNotifier::default()).await;
        for id in 1..=15 {
            put_secret(&h.store, &format!("s{id}"), &id.to_string()).await;
            h.reminders
                .insert(RotationReminder::new(
                    id,
                    TenantId::project(1),
                    format!("s{id}"),
                    Utc::now() - Duration::minutes(100 - id),
                ))
                .await;
        }

        let first = h.reconciler.run(Utc::now()).await.unwrap();
        assert_eq!(first.processed_count, 10);
        let second = h.reconciler.run(Utc::now()).await.unwrap();
        assert_eq!(second.processed_count, 5);
    }
}
