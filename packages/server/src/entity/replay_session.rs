use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A bounded, trackable re-publication of stored events matching a filter.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replay_session")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub session_id: String,

    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// One of: CREATED, RUNNING, PAUSED, COMPLETED, CANCELLED.
    #[sea_orm(indexed)]
    pub status: String,

    /// Filter snapshot captured on creation; immutable afterwards.
    #[sea_orm(column_type = "JsonBinary")]
    pub event_filter: Json,

    pub total_events: i32,

    /// Derived counters, recomputed from replay_event rows on every
    /// resolution rather than incremented in place.
    pub processed_events: i32,
    pub successful_events: i32,
    pub failed_events: i32,

    #[sea_orm(indexed)]
    pub created_by: Option<String>,

    pub started_at: Option<DateTimeUtc>,

    pub completed_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
