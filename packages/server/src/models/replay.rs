use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::EventFilter;

use crate::entity::{replay_event, replay_session};
use crate::replay::{ReplayCounters, progress_pct};

use super::shared::Pagination;

/// Request body for creating a replay session.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateReplayRequest {
    #[schema(example = "Replay failed June orders")]
    pub name: String,
    pub description: Option<String>,
    /// Criteria selecting which stored events to replay. An empty filter
    /// matches every stored event.
    #[serde(default)]
    pub filter: EventFilter,
    #[schema(example = "ops-team")]
    pub created_by: Option<String>,
}

/// Query parameters for listing replay sessions.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListReplayParams {
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

/// Query parameters for listing a session's per-event outcomes.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListReplayEventsParams {
    /// Session whose outcome rows to list.
    pub session_id: String,
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReplaySessionResponse {
    #[schema(example = "7d8e1f00-4b2a-41d4-a716-446655440000")]
    pub session_id: String,
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "RUNNING")]
    pub status: String,
    #[schema(value_type = Object)]
    pub event_filter: serde_json::Value,
    #[schema(example = 250)]
    pub total_events: i32,
    pub processed_events: i32,
    pub successful_events: i32,
    pub failed_events: i32,
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<replay_session::Model> for ReplaySessionResponse {
    fn from(m: replay_session::Model) -> Self {
        Self {
            session_id: m.session_id,
            name: m.name,
            description: m.description,
            status: m.status,
            event_filter: m.event_filter,
            total_events: m.total_events,
            processed_events: m.processed_events,
            successful_events: m.successful_events,
            failed_events: m.failed_events,
            created_by: m.created_by,
            started_at: m.started_at,
            completed_at: m.completed_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReplayListResponse {
    pub data: Vec<ReplaySessionResponse>,
    pub pagination: Pagination,
}

/// Outcome of one replayed event within a session.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReplayEventResponse {
    pub session_id: String,
    pub event_id: String,
    #[schema(example = "replay-processor")]
    pub processor_name: String,
    #[schema(example = "SUCCESS")]
    pub status: String,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub processing_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<replay_event::Model> for ReplayEventResponse {
    fn from(m: replay_event::Model) -> Self {
        Self {
            session_id: m.session_id,
            event_id: m.event_id,
            processor_name: m.processor_name,
            status: m.status,
            error_message: m.error_message,
            attempt_count: m.attempt_count,
            processing_time: m.processing_time,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReplayEventListResponse {
    pub data: Vec<ReplayEventResponse>,
    pub pagination: Pagination,
}

/// Live progress of a replay session, with counters derived from the
/// per-event rows at request time.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReplayProgressResponse {
    pub session_id: String,
    #[schema(example = "RUNNING")]
    pub status: String,
    #[schema(example = 250)]
    pub total_events: i64,
    #[schema(example = 120)]
    pub processed_events: i64,
    #[schema(example = 117)]
    pub successful_events: i64,
    #[schema(example = 3)]
    pub failed_events: i64,
    /// Percentage of the session that has resolved, 0-100.
    #[schema(example = 48.0)]
    pub progress_percentage: f64,
}

impl ReplayProgressResponse {
    pub fn new(session: &replay_session::Model, counters: ReplayCounters) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.status.clone(),
            total_events: session.total_events as i64,
            processed_events: counters.processed,
            successful_events: counters.successful,
            failed_events: counters.failed,
            progress_percentage: progress_pct(counters.processed, session.total_events as i64),
        }
    }
}
