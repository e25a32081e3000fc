use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable domain fact. Rows are created once on publish and never
/// mutated except by an explicit manual correction that bumps `version`.
/// Kept forever as the audit trail and the replay source.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub event_id: String,

    #[sea_orm(indexed)]
    pub event_type: String,

    #[sea_orm(column_type = "Text")]
    pub payload: String,

    pub source_system: Option<String>,

    #[sea_orm(indexed)]
    pub correlation_id: Option<String>,

    pub version: i32,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Wire message for publishing this stored event onto a queue.
    pub fn to_message(&self) -> common::EventMessage {
        common::EventMessage {
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            payload: self.payload.clone(),
            source_system: self.source_system.clone(),
            correlation_id: self.correlation_id.clone(),
            version: self.version,
            created_at: self.created_at,
        }
    }
}
