use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{event, processing_record};

use super::shared::Pagination;

/// Request body for publishing a new event.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PublishEventRequest {
    /// Domain event type used for processor routing.
    #[schema(example = "OrderCreated")]
    pub event_type: String,
    /// Event payload as a JSON string.
    #[schema(example = r#"{"orderId":"ORD-1","customerId":"CUST-1","amount":99.5}"#)]
    pub payload: String,
    #[schema(example = "OrderService")]
    pub source_system: Option<String>,
    #[schema(example = "corr-7f3a")]
    pub correlation_id: Option<String>,
}

/// Request body for manually correcting a stored event's payload.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CorrectEventRequest {
    /// Replacement payload as a JSON string.
    #[schema(example = r#"{"orderId":"ORD-1","customerId":"CUST-1","amount":50}"#)]
    pub payload: String,
}

/// Query parameters for listing stored events.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListEventsParams {
    /// Filter by event type.
    #[param(example = "OrderCreated")]
    pub event_type: Option<String>,
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

/// A stored event.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub event_id: String,
    #[schema(example = "OrderCreated")]
    pub event_type: String,
    pub payload: String,
    pub source_system: Option<String>,
    pub correlation_id: Option<String>,
    #[schema(example = 1)]
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<event::Model> for EventResponse {
    fn from(m: event::Model) -> Self {
        Self {
            event_id: m.event_id,
            event_type: m.event_type,
            payload: m.payload,
            source_system: m.source_system,
            correlation_id: m.correlation_id,
            version: m.version,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventListResponse {
    pub data: Vec<EventResponse>,
    pub pagination: Pagination,
}

/// One processor's ledger row for an event.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProcessingRecordResponse {
    pub event_id: String,
    #[schema(example = "order-processor")]
    pub processor_name: String,
    #[schema(example = "SUCCESS")]
    pub status: String,
    #[schema(example = 2)]
    pub attempt_count: i32,
    #[schema(example = 3)]
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub processing_start_time: Option<DateTime<Utc>>,
    pub processing_end_time: Option<DateTime<Utc>>,
    pub next_retry_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<processing_record::Model> for ProcessingRecordResponse {
    fn from(m: processing_record::Model) -> Self {
        Self {
            event_id: m.event_id,
            processor_name: m.processor_name,
            status: m.status,
            attempt_count: m.attempt_count,
            max_attempts: m.max_attempts,
            error_message: m.error_message,
            processing_start_time: m.processing_start_time,
            processing_end_time: m.processing_end_time,
            next_retry_time: m.next_retry_time,
            created_at: m.created_at,
        }
    }
}

/// Processing status of one event across every processor that claimed it.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EventStatusResponse {
    pub event_id: String,
    pub records: Vec<ProcessingRecordResponse>,
}
