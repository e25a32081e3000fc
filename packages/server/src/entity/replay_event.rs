use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per matched historical event per replay session.
///
/// Created in bulk (status PENDING) when a session starts; mutated as each
/// replayed event resolves. The (session_id, event_id) pair is unique.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "replay_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub session_id: String,

    #[sea_orm(indexed)]
    pub event_id: String,

    /// Fixed to "replay-processor" in the current design.
    pub processor_name: String,

    /// One of: PENDING, PROCESSING, SUCCESS, FAILED.
    #[sea_orm(indexed)]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub attempt_count: i32,

    pub processing_time: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
