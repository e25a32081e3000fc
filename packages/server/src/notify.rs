use serde_json::json;
use tracing::{error, info, warn};

use common::alert::{Alert, AlertSeverity, AlertType, DlqAlert};

use crate::entity::replay_session;

/// A single alert delivery target.
pub trait AlertChannel: Send + Sync {
    fn channel_name(&self) -> &str;

    fn enabled(&self) -> bool {
        true
    }

    fn send(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Writes alerts to the structured log at a level matching their severity.
pub struct LogAlertChannel;

impl AlertChannel for LogAlertChannel {
    fn channel_name(&self) -> &str {
        "log"
    }

    fn send(&self, alert: &Alert) -> anyhow::Result<()> {
        match alert.severity {
            AlertSeverity::Info => info!(
                alert_id = %alert.alert_id,
                alert_type = ?alert.alert_type,
                source = %alert.source,
                metadata = %json!(alert.metadata),
                "{}: {}", alert.title, alert.message
            ),
            AlertSeverity::Warning => warn!(
                alert_id = %alert.alert_id,
                alert_type = ?alert.alert_type,
                source = %alert.source,
                metadata = %json!(alert.metadata),
                "{}: {}", alert.title, alert.message
            ),
            AlertSeverity::Error | AlertSeverity::Critical => error!(
                alert_id = %alert.alert_id,
                alert_type = ?alert.alert_type,
                source = %alert.source,
                metadata = %json!(alert.metadata),
                "{}: {}", alert.title, alert.message
            ),
        }
        Ok(())
    }
}

/// Fire-and-forget fan-out over all enabled channels. A failing channel is
/// logged and skipped; alert delivery never propagates errors back into the
/// operation that raised the alert.
pub struct Notifier {
    channels: Vec<Box<dyn AlertChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn AlertChannel>>) -> Self {
        Self { channels }
    }

    pub fn with_log_channel() -> Self {
        Self::new(vec![Box::new(LogAlertChannel)])
    }

    pub fn send(&self, alert: &Alert) {
        for channel in &self.channels {
            if !channel.enabled() {
                continue;
            }
            if let Err(e) = channel.send(alert) {
                error!(
                    channel = channel.channel_name(),
                    alert_id = %alert.alert_id,
                    error = %e,
                    "Failed to deliver alert"
                );
            }
        }
    }

    pub fn dlq_alert(&self, dlq: &DlqAlert) {
        let alert = Alert::new(
            AlertType::DlqEvent,
            AlertSeverity::Error,
            "Event moved to dead letter queue",
            format!(
                "Event {} failed after {} attempts and was quarantined. Reason: {}",
                dlq.event_id, dlq.total_attempts, dlq.failure_reason
            ),
            "dlq-manager",
        )
        .with_metadata("event_id", json!(dlq.event_id))
        .with_metadata("processor", json!(dlq.processor_name))
        .with_metadata("total_attempts", json!(dlq.total_attempts))
        .with_metadata("moved_to_dlq_at", json!(dlq.moved_to_dlq_at));

        self.send(&alert);
    }

    pub fn replay_completed(&self, session: &replay_session::Model) {
        let severity = if session.failed_events > 0 {
            AlertSeverity::Warning
        } else {
            AlertSeverity::Info
        };

        let alert = Alert::new(
            AlertType::ReplayCompleted,
            severity,
            "Replay session completed",
            format!(
                "Replay session '{}' completed: {} total, {} succeeded, {} failed",
                session.name,
                session.total_events,
                session.successful_events,
                session.failed_events
            ),
            "replay-orchestrator",
        )
        .with_metadata("session_id", json!(session.session_id))
        .with_metadata("total_events", json!(session.total_events))
        .with_metadata("successful_events", json!(session.successful_events))
        .with_metadata("failed_events", json!(session.failed_events));

        self.send(&alert);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct RecordingChannel {
        seen: Mutex<Vec<String>>,
        enabled: bool,
    }

    impl AlertChannel for RecordingChannel {
        fn channel_name(&self) -> &str {
            "recording"
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn send(&self, alert: &Alert) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(alert.title.clone());
            Ok(())
        }
    }

    struct FailingChannel {
        attempts: AtomicUsize,
    }

    impl AlertChannel for FailingChannel {
        fn channel_name(&self) -> &str {
            "failing"
        }

        fn send(&self, _alert: &Alert) -> anyhow::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("channel down")
        }
    }

    fn test_alert() -> Alert {
        Alert::new(
            AlertType::DlqEvent,
            AlertSeverity::Error,
            "title",
            "message",
            "test",
        )
    }

    #[test]
    fn test_disabled_channels_are_skipped() {
        let channel = Box::new(RecordingChannel {
            seen: Mutex::new(Vec::new()),
            enabled: false,
        });
        let notifier = Notifier::new(vec![channel]);
        notifier.send(&test_alert());
        // No panic, nothing delivered: channel was disabled.
    }

    #[test]
    fn test_channel_failure_does_not_stop_fanout() {
        let failing = Box::new(FailingChannel {
            attempts: AtomicUsize::new(0),
        });
        let recording = Box::new(RecordingChannel {
            seen: Mutex::new(Vec::new()),
            enabled: true,
        });
        let notifier = Notifier::new(vec![failing, recording]);

        // Must not panic or propagate the first channel's failure.
        notifier.send(&test_alert());
    }
}
