use common::EventMessage;
use mq::Mq;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entity::{event, processing_record};
use crate::error::AppError;

/// Fields of a not-yet-published event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub payload: String,
    pub source_system: Option<String>,
    pub correlation_id: Option<String>,
}

/// Persist a new event and publish it to the primary queue.
///
/// Store-then-publish: the durable copy is written before the wire copy
/// goes out, so a publish failure leaves a stored event that can later be
/// replayed, never a consumed event with no audit row.
pub async fn publish_event(
    db: &DatabaseConnection,
    mq: &Mq,
    queue: &str,
    new: NewEvent,
) -> Result<event::Model, AppError> {
    if new.event_type.trim().is_empty() {
        return Err(AppError::Validation("event_type must not be blank".into()));
    }
    serde_json::from_str::<serde_json::Value>(&new.payload)
        .map_err(|e| AppError::Validation(format!("payload must be valid JSON: {e}")))?;

    let mut message = EventMessage::new(
        Uuid::new_v4().to_string(),
        new.event_type,
        new.payload,
    );
    message.source_system = new.source_system;
    message.correlation_id = new.correlation_id;

    let model = event::ActiveModel {
        event_id: Set(message.event_id.clone()),
        event_type: Set(message.event_type.clone()),
        payload: Set(message.payload.clone()),
        source_system: Set(message.source_system.clone()),
        correlation_id: Set(message.correlation_id.clone()),
        version: Set(message.version),
        created_at: Set(message.created_at),
        ..Default::default()
    };
    let stored = model.insert(db).await?;

    mq.publish(queue, None, &message, None)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to publish event: {e}")))?;

    info!(
        event_id = %stored.event_id,
        event_type = %stored.event_type,
        "Event published"
    );
    Ok(stored)
}

/// Manually correct a stored event's payload.
///
/// The one sanctioned mutation of an event row: replaces the payload and
/// bumps `version` so downstream consumers can tell a corrected fact from
/// the original.
pub async fn correct_event(
    db: &DatabaseConnection,
    event_id: &str,
    payload: String,
) -> Result<event::Model, AppError> {
    serde_json::from_str::<serde_json::Value>(&payload)
        .map_err(|e| AppError::Validation(format!("payload must be valid JSON: {e}")))?;

    let result = event::Entity::update_many()
        .col_expr(event::Column::Payload, Expr::value(payload))
        .col_expr(
            event::Column::Version,
            Expr::col(event::Column::Version).add(1),
        )
        .filter(event::Column::EventId.eq(event_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound(format!("Event {event_id} not found")));
    }

    let corrected = get_event(db, event_id)
        .await?
        .ok_or_else(|| AppError::Internal("Corrected event vanished".to_string()))?;

    info!(
        event_id = %corrected.event_id,
        version = corrected.version,
        "Event payload manually corrected"
    );
    Ok(corrected)
}

pub async fn get_event(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<Option<event::Model>, AppError> {
    Ok(event::Entity::find()
        .filter(event::Column::EventId.eq(event_id))
        .one(db)
        .await?)
}

/// Newest-first page of stored events, optionally narrowed by type.
pub async fn list_events(
    db: &DatabaseConnection,
    event_type: Option<String>,
    page: u64,
    per_page: u64,
) -> Result<(Vec<event::Model>, u64), AppError> {
    let mut query = event::Entity::find();
    if let Some(event_type) = event_type {
        query = query.filter(event::Column::EventType.eq(event_type));
    }

    let total = query.clone().count(db).await?;
    let events = query
        .order_by_desc(event::Column::CreatedAt)
        .order_by_desc(event::Column::Id)
        .offset((page.saturating_sub(1)) * per_page)
        .limit(per_page)
        .all(db)
        .await?;

    Ok((events, total))
}

/// Every processor's ledger row for one event.
pub async fn get_processing_records(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<Vec<processing_record::Model>, AppError> {
    Ok(processing_record::Entity::find()
        .filter(processing_record::Column::EventId.eq(event_id))
        .order_by_asc(processing_record::Column::ProcessorName)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    fn stored_event(version: i32, payload: &str) -> event::Model {
        event::Model {
            id: 1,
            event_id: "evt-1".to_string(),
            event_type: "OrderCreated".to_string(),
            payload: payload.to_string(),
            source_system: Some("OrderService".to_string()),
            correlation_id: None,
            version,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_correction_replaces_payload_and_bumps_version() {
        let corrected = stored_event(2, r#"{"orderId":"ORD-1","amount":50}"#);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![corrected.clone()]])
            .into_connection();

        let result = correct_event(&db, "evt-1", corrected.payload.clone())
            .await
            .unwrap();
        assert_eq!(result.version, 2);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("version"), "correction must bump version: {log}");
    }

    #[tokio::test]
    async fn test_correction_rejects_malformed_payload() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = correct_event(&db, "evt-1", "not json".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_correcting_an_unknown_event_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let err = correct_event(&db, "evt-missing", "{}".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
