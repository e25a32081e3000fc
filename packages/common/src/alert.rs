use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    DlqEvent,
    ReplayCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A structured operator-facing alert, delivered best-effort through the
/// notifier's channels. Delivery failures are logged and never propagated
/// back into the operation that raised the alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4().to_string(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            metadata: HashMap::new(),
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Wire message published onto the `event_dlq` queue when an event is
/// quarantined; consumed by the alerting fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqAlert {
    pub event_id: String,
    pub processor_name: String,
    pub failure_reason: String,
    pub total_attempts: i32,
    pub moved_to_dlq_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_gets_id_and_timestamp() {
        let alert = Alert::new(
            AlertType::DlqEvent,
            AlertSeverity::Error,
            "Event moved to DLQ",
            "details",
            "dlq-manager",
        );
        assert!(!alert.alert_id.is_empty());
        assert!(alert.metadata.is_empty());
    }

    #[test]
    fn test_metadata_builder() {
        let alert = Alert::new(
            AlertType::ReplayCompleted,
            AlertSeverity::Info,
            "Replay completed",
            "done",
            "replay",
        )
        .with_metadata("session_id", serde_json::json!("sess-1"))
        .with_metadata("total_events", serde_json::json!(10));

        assert_eq!(alert.metadata.len(), 2);
        assert_eq!(alert.metadata["total_events"], serde_json::json!(10));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::Error);
        assert!(AlertSeverity::Error > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }
}
