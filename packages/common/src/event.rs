use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire representation of a domain event.
///
/// This is the message published to the `events`, `event_retry` and
/// `event_replay` queues. The durable copy lives in the event store; the
/// wire copy is self-contained so consumers never need a DB round-trip to
/// start processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Globally unique event identifier (also the partitioning key).
    pub event_id: String,
    /// Domain event type, e.g. "OrderCreated".
    pub event_type: String,
    /// Opaque JSON payload, stored as a string.
    pub payload: String,
    /// System that emitted the event.
    pub source_system: Option<String>,
    /// Correlation id linking related events.
    pub correlation_id: Option<String>,
    /// Version, bumped only by explicit manual correction.
    pub version: i32,
    /// When the event was first published.
    pub created_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload: payload.into(),
            source_system: None,
            correlation_id: None,
            version: 1,
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source_system: impl Into<String>) -> Self {
        self.source_system = Some(source_system.into());
        self
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Envelope published to the retry queue when a due retry timer fires.
///
/// Carries the processor name so the retry consumer can re-run the exact
/// processor that failed instead of re-resolving by event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDispatch {
    pub processor_name: String,
    pub event: EventMessage,
}

/// Envelope published to the replay queue for each event in a replay batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDispatch {
    pub session_id: String,
    pub event: EventMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_json() {
        let event = EventMessage::new("evt-1", "OrderCreated", r#"{"orderId":"ORD-1"}"#)
            .with_source("OrderService")
            .with_correlation("corr-7");

        let json = serde_json::to_string(&event).unwrap();
        let back: EventMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(back, event);
        assert_eq!(back.version, 1);
    }

    #[test]
    fn test_optional_fields_default_to_none() {
        let event = EventMessage::new("evt-2", "PaymentProcessed", "{}");
        assert!(event.source_system.is_none());
        assert!(event.correlation_id.is_none());
    }
}
