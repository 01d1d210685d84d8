use super::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local record tracking when a secret owner should next be reminded to rotate it.
///
/// The store's custom metadata for the secret carries `rotation_info_id`; a
/// reminder whose id no longer matches has been superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationReminder {
    pub id: i64,
    pub tenant: TenantId,
    pub secret_name: String,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub next_reminder_at: DateTime<Utc>,
    pub notification_sent: bool,
}

impl RotationReminder {
    pub fn new(
        id: i64,
        tenant: TenantId,
        secret_name: impl Into<String>,
        next_reminder_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant,
            secret_name: secret_name.into(),
            last_reminder_at: None,
            next_reminder_at,
            notification_sent: false,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.notification_sent && self.next_reminder_at <= now
    }

    /// Whether the store metadata reference points at this reminder
    pub fn matches_reference(&self, reference: Option<&str>) -> bool {
        reference.and_then(|r| r.trim().parse::<i64>().ok()) == Some(self.id)
    }
}
