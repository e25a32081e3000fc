use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query specification selecting the candidate set for a replay session.
///
/// All fields are optional and combined with AND. The filter is captured as
/// a JSON snapshot on the session when it is created and never changes
/// afterwards, so re-evaluating it on resume sees the same specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EventFilter {
    /// Match a single event type exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Inclusive lower bound on event creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on event creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
    /// Match the emitting system exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    /// Match the correlation id exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Explicit event id list; empty means "no id restriction".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_ids: Vec<String>,
}

impl EventFilter {
    /// A filter with no constraints matches every stored event.
    pub fn is_unconstrained(&self) -> bool {
        self.event_type.is_none()
            && self.from_date.is_none()
            && self.to_date.is_none()
            && self.source_system.is_none()
            && self.correlation_id.is_none()
            && self.event_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_is_unconstrained() {
        assert!(EventFilter::default().is_unconstrained());
    }

    #[test]
    fn test_any_field_constrains() {
        let filter = EventFilter {
            event_type: Some("OrderCreated".into()),
            ..Default::default()
        };
        assert!(!filter.is_unconstrained());

        let filter = EventFilter {
            event_ids: vec!["evt-1".into()],
            ..Default::default()
        };
        assert!(!filter.is_unconstrained());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let filter = EventFilter {
            event_type: Some("OrderCreated".into()),
            source_system: Some("OrderService".into()),
            event_ids: vec!["evt-1".into(), "evt-2".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        let back: EventFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_absent_fields_deserialize_to_defaults() {
        let filter: EventFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.is_unconstrained());
    }
}
