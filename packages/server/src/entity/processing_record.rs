use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger row driving the retry/success/DLQ state machine.
///
/// Keyed by the (event_id, processor_name) pair, which is unique: one row
/// per processor that claimed the event. Rows are never deleted; they are
/// the processing audit trail.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "processing_record")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub event_id: String,

    #[sea_orm(indexed)]
    pub processor_name: String,

    /// One of: PENDING, PROCESSING, SUCCESS, FAILED, RETRY, DLQ.
    #[sea_orm(indexed)]
    pub status: String,

    pub attempt_count: i32,

    pub max_attempts: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub processing_start_time: Option<DateTimeUtc>,

    pub processing_end_time: Option<DateTimeUtc>,

    #[sea_orm(indexed)]
    pub next_retry_time: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
