//! # Metrics Collection
//!
//! Counters for secret store traffic and the rotation reminder batch. Only the
//! `metrics` facade is used here; installing an exporter is left to the
//! embedding process.

use metrics::counter;

/// Metrics recorder that tracks store and reconciler activity
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record one secret store request and its outcome
    pub fn record_store_request(&self, operation: &'static str, status: Option<u16>) {
        let status = status.map_or_else(|| "unreachable".to_string(), |s| s.to_string());
        let labels = [("operation", operation.to_string()), ("status", status)];
        counter!("vault_requests_total", &labels).increment(1);
    }

    /// Record the outcome of one reconciler invocation
    pub fn record_reminder_batch(&self, processed: usize, skipped: usize, failed: usize) {
        counter!("rotation_reminders_processed_total").increment(processed as u64);
        counter!("rotation_reminders_skipped_total").increment(skipped as u64);
        counter!("rotation_reminders_failed_total").increment(failed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.record_store_request("get_policy", Some(200));
        recorder.record_store_request("get_policy", None);
        recorder.record_reminder_batch(3, 1, 0);
    }
}
