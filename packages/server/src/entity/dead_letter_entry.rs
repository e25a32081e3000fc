use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Quarantine record for an event that exhausted automatic retries.
///
/// One active entry per event id: a later failure cycle for the same event
/// overwrites the existing row rather than appending history.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dead_letter_entry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub event_id: String,

    #[sea_orm(indexed)]
    pub processor_name: String,

    /// Payload snapshot taken at quarantine time, used for manual retry.
    #[sea_orm(column_type = "Text")]
    pub original_payload: String,

    #[sea_orm(column_type = "Text")]
    pub failure_reason: String,

    pub total_attempts: i32,

    pub first_failure_time: DateTimeUtc,

    #[sea_orm(indexed)]
    pub last_failure_time: DateTimeUtc,

    /// One of: ACTIVE, ARCHIVED, RETRIED.
    #[sea_orm(indexed)]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub archive_reason: Option<String>,

    /// Soft retention horizon; entries past it are eligible for cleanup.
    pub retention_deadline: DateTimeUtc,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
